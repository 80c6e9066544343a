//! Per-job state machine.

use serde::{Deserialize, Serialize};

/// Job state.
///
/// State transitions:
/// - Queued -> Dispatching -> Running -> Completed
/// - Queued -> Dispatching -> Running -> Failed
/// - Queued -> Dispatching -> Completed (no processor configured, signal consumed)
///
/// There is no retry state: a failed job is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Signal sits in the buffer.
    Queued,

    /// Dispatcher holds the worker slot for this job.
    Dispatching,

    /// Processor invocation in flight.
    Running,

    /// Processor returned Ok (or there was nothing to run).
    Completed,

    /// Processor returned an error.
    Failed,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Dispatching)
                | (JobState::Dispatching, JobState::Running)
                | (JobState::Dispatching, JobState::Completed)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Dispatching => "dispatching",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
