//! Integrated builder: the job queue plus the secrets and configuration the
//! signing step runs with.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::IntegratedConfig;
use crate::error::SignboxError;
use crate::queue::{JobProcessor, JobQueue, QueueStatus};
use crate::secrets::Secrets;
use crate::status::StatusReporter;

/// What the outer layers need from a builder.
pub trait Builder: Send + Sync {
    /// Ask for one processing run. Never waits.
    fn trigger(&self) -> Result<(), SignboxError>;

    /// Replace all secrets at once.
    fn set_secrets(&self, secrets: HashMap<String, String>) -> Result<(), SignboxError>;

    /// Status payload as an embeddable `data:` URL.
    fn status_url(&self) -> Result<String, SignboxError>;
}

/// Builder that runs the signing entrypoint locally, one job at a time.
///
/// # Example
/// ```
/// use signbox_core::{Builder, IntegratedBuilder, IntegratedConfig};
///
/// let builder = IntegratedBuilder::new(IntegratedConfig {
///     queue_capacity: 2,
///     ..Default::default()
/// })
/// .unwrap();
/// builder.trigger().unwrap();
/// builder.trigger().unwrap();
/// assert!(builder.trigger().is_err());
/// assert_eq!(
///     builder.status_url().unwrap(),
///     r#"data:application/json,{"pending_jobs":2,"active_jobs":0,"type":"integrated"}"#
/// );
/// ```
pub struct IntegratedBuilder {
    config: IntegratedConfig,
    queue: JobQueue,
    secrets: Arc<Secrets>,
    reporter: StatusReporter,
}

impl IntegratedBuilder {
    pub fn new(config: IntegratedConfig) -> Result<Self, SignboxError> {
        let queue = JobQueue::from_config(&config)?;
        let secrets = Arc::new(Secrets::new());
        let reporter = StatusReporter::new(queue.clone(), Arc::clone(&secrets));
        Ok(Self {
            config,
            queue,
            secrets,
            reporter,
        })
    }

    /// Inject the processing step; starts the dispatcher.
    ///
    /// Must be called from inside a Tokio runtime. Outside one it returns
    /// `NoRuntime` without installing anything, and can be called again.
    pub fn set_processor<P>(&self, processor: P) -> Result<(), SignboxError>
    where
        P: JobProcessor + 'static,
    {
        self.queue.set_processor(processor)?;
        tracing::info!(
            entrypoint = %self.config.entrypoint(),
            timeout_secs = self.job_timeout().as_secs(),
            "integrated builder ready"
        );
        Ok(())
    }

    pub fn secrets(&self) -> Arc<HashMap<String, String>> {
        self.secrets.get()
    }

    /// Shared secrets holder, for processors that read secrets per job.
    pub fn secrets_handle(&self) -> Arc<Secrets> {
        Arc::clone(&self.secrets)
    }

    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn config(&self) -> &IntegratedConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable
    }

    pub fn sign_files_dir(&self) -> &Path {
        self.config.sign_files_dir()
    }

    pub fn entrypoint(&self) -> &str {
        self.config.entrypoint()
    }

    pub fn job_timeout(&self) -> Duration {
        self.queue.job_timeout()
    }
}

impl Builder for IntegratedBuilder {
    fn trigger(&self) -> Result<(), SignboxError> {
        self.queue.trigger()
    }

    fn set_secrets(&self, secrets: HashMap<String, String>) -> Result<(), SignboxError> {
        self.secrets.set(secrets);
        Ok(())
    }

    fn status_url(&self) -> Result<String, SignboxError> {
        self.reporter.data_url()
    }
}
