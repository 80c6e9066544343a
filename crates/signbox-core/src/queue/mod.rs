//! Queue module: job signals, the single-flight dispatcher and the processor seam.

mod dispatcher;
mod job_queue;
mod processor;
mod state;

pub use job_queue::JobQueue;
pub use processor::{JobContext, JobId, JobProcessor};
pub use state::JobState;

use serde::{Deserialize, Serialize};

/// "Work became available." Signals carry no payload and are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSignal;

/// Best-effort view of the queue; may race with an in-flight transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending_jobs: usize,
    pub active_jobs: usize,
}
