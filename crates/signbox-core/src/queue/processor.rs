use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::SignboxError;

/// Sequence number assigned to a job when the dispatcher picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What a processor gets to know about the job it runs.
///
/// The queue never cancels a running job; honouring `deadline` is up to the processor.
#[derive(Debug, Clone, Copy)]
pub struct JobContext {
    pub job_id: JobId,
    pub timeout: Duration,
    pub deadline: Instant,
}

/// Deadline used when `now + timeout` does not fit in an `Instant` (about 30 years out).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

impl JobContext {
    pub fn new(job_id: JobId, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            job_id,
            timeout,
            deadline: now
                .checked_add(timeout)
                .unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// The processing step run for every dequeued signal.
///
/// Injected into the queue after construction so the queue has no compile-time
/// knowledge of what signing actually does. Any `Fn(JobContext) -> impl Future`
/// closure works as a processor.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, ctx: JobContext) -> Result<(), SignboxError>;
}

#[async_trait]
impl<F, Fut> JobProcessor for F
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SignboxError>> + Send + 'static,
{
    async fn process(&self, ctx: JobContext) -> Result<(), SignboxError> {
        (self)(ctx).await
    }
}
