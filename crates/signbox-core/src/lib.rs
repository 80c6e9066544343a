//! signbox-core
//!
//! Core building blocks for the local signing service.
//!
//! # Modules
//! - **queue**: bounded single-flight job queue (trigger → dispatcher → one processor at a time)
//! - **storage**: upload resolver backed by a directory, with TTL eviction and a cleanup loop
//! - **builder**: the integrated builder that composes the queue with secrets and configuration
//! - **status**: observational status payload for operators
//! - **secrets**: whole-value swapped secrets snapshot
//! - **clock**: time source port (system / fixed)
//! - **config**: configuration surface (loaded elsewhere)
//! - **error**: error type shared by all of the above

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod queue;
pub mod secrets;
pub mod status;
pub mod storage;

pub use builder::{Builder, IntegratedBuilder};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{IntegratedConfig, StorageConfig};
pub use error::SignboxError;
pub use queue::{JobContext, JobId, JobProcessor, JobQueue, JobState, QueueStatus};
pub use secrets::Secrets;
pub use status::{StatusPayload, StatusReporter, StatusSnapshot};
pub use storage::{CleanupHandle, CleanupLoop, CleanupReport, Upload, UploadInfo, UploadResolver};
