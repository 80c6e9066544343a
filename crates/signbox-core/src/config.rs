//! Configuration surface for the integrated builder and the upload store.
//!
//! Loading (file format, location) is the caller's business; these types only
//! carry the values and their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SignboxError;

/// Entrypoint used when none is configured.
pub const DEFAULT_ENTRYPOINT: &str = "sign.py";

/// Job timeout used when `job_timeout_mins` is zero or unset.
pub const DEFAULT_JOB_TIMEOUT_MINS: u64 = 15;

/// Upper bound accepted for `job_timeout_mins` (one week).
pub const MAX_JOB_TIMEOUT_MINS: u64 = 7 * 24 * 60;

/// Upper bound accepted for `upload_ttl_mins` and `cleanup_interval_mins` (one year).
pub const MAX_STORAGE_MINS: u64 = 365 * 24 * 60;

/// Signal buffer size of the job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Configuration for the integrated builder.
///
/// ```
/// use signbox_core::IntegratedConfig;
///
/// let config: IntegratedConfig = serde_json::from_str(r#"{"enable": true}"#).unwrap();
/// assert_eq!(config.entrypoint(), "sign.py");
/// assert_eq!(config.job_timeout().as_secs(), 15 * 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedConfig {
    #[serde(default)]
    pub enable: bool,

    /// Directory holding the signing entrypoint and its support files.
    #[serde(default = "default_sign_files_dir")]
    pub sign_files_dir: PathBuf,

    /// Script name inside `sign_files_dir`. Empty means [`DEFAULT_ENTRYPOINT`].
    #[serde(default)]
    pub entrypoint: String,

    /// Per-job budget in minutes. Zero means [`DEFAULT_JOB_TIMEOUT_MINS`].
    #[serde(default)]
    pub job_timeout_mins: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_sign_files_dir() -> PathBuf {
    PathBuf::from("sign_files")
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for IntegratedConfig {
    fn default() -> Self {
        Self {
            enable: false,
            sign_files_dir: default_sign_files_dir(),
            entrypoint: String::new(),
            job_timeout_mins: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl IntegratedConfig {
    pub fn entrypoint(&self) -> &str {
        if self.entrypoint.is_empty() {
            DEFAULT_ENTRYPOINT
        } else {
            &self.entrypoint
        }
    }

    pub fn entrypoint_path(&self) -> PathBuf {
        self.sign_files_dir.join(self.entrypoint())
    }

    pub fn sign_files_dir(&self) -> &Path {
        &self.sign_files_dir
    }

    /// Budget handed to each processing invocation.
    pub fn job_timeout(&self) -> Duration {
        let mins = if self.job_timeout_mins == 0 {
            DEFAULT_JOB_TIMEOUT_MINS
        } else {
            self.job_timeout_mins
        };
        Duration::from_secs(mins.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<(), SignboxError> {
        if self.queue_capacity == 0 {
            return Err(SignboxError::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.job_timeout_mins > MAX_JOB_TIMEOUT_MINS {
            return Err(SignboxError::Config(format!(
                "job_timeout_mins must be at most {MAX_JOB_TIMEOUT_MINS}, got {}",
                self.job_timeout_mins
            )));
        }
        Ok(())
    }
}

/// Configuration for the upload directory and its eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Uploads untouched for longer than this are evicted.
    #[serde(default = "default_upload_ttl_mins")]
    pub upload_ttl_mins: u64,

    /// How often the cleanup sweep runs.
    #[serde(default = "default_cleanup_interval_mins")]
    pub cleanup_interval_mins: u64,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_upload_ttl_mins() -> u64 {
    60
}

fn default_cleanup_interval_mins() -> u64 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            upload_ttl_mins: default_upload_ttl_mins(),
            cleanup_interval_mins: default_cleanup_interval_mins(),
        }
    }
}

impl StorageConfig {
    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_ttl_mins.saturating_mul(60))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_mins.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<(), SignboxError> {
        // tokio::time::interval panics on a zero period
        if self.cleanup_interval_mins == 0 {
            return Err(SignboxError::Config(
                "cleanup_interval_mins must be greater than zero".to_string(),
            ));
        }
        for (name, mins) in [
            ("upload_ttl_mins", self.upload_ttl_mins),
            ("cleanup_interval_mins", self.cleanup_interval_mins),
        ] {
            if mins > MAX_STORAGE_MINS {
                return Err(SignboxError::Config(format!(
                    "{name} must be at most {MAX_STORAGE_MINS}, got {mins}"
                )));
            }
        }
        Ok(())
    }
}
