//! Status - observational payload for operators
//!
//! Reads the queue through its non-blocking `status()` only, so building a
//! payload never waits on the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SignboxError;
use crate::queue::{JobQueue, QueueStatus};
use crate::secrets::Secrets;

/// Value of the `type` field in the payload.
pub const BUILDER_TYPE: &str = "integrated";

/// `{pending_jobs, active_jobs, type}` as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub pending_jobs: usize,
    pub active_jobs: usize,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Everything the reporter knows at one instant.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub queue: QueueStatus,
    pub secrets: Arc<HashMap<String, String>>,
}

#[derive(Clone)]
pub struct StatusReporter {
    queue: JobQueue,
    secrets: Arc<Secrets>,
}

impl StatusReporter {
    pub fn new(queue: JobQueue, secrets: Arc<Secrets>) -> Self {
        Self { queue, secrets }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            queue: self.queue.status(),
            secrets: self.secrets.get(),
        }
    }

    pub fn payload(&self) -> StatusPayload {
        let status = self.queue.status();
        StatusPayload {
            pending_jobs: status.pending_jobs,
            active_jobs: status.active_jobs,
            kind: BUILDER_TYPE.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, SignboxError> {
        Ok(serde_json::to_string(&self.payload())?)
    }

    /// The payload inlined as a `data:` URL.
    pub fn data_url(&self) -> Result<String, SignboxError> {
        Ok(format!("data:application/json,{}", self.to_json()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn reporter(capacity: usize) -> (StatusReporter, JobQueue, Arc<Secrets>) {
        let queue = JobQueue::new(capacity, Duration::from_secs(60)).unwrap();
        let secrets = Arc::new(Secrets::new());
        (
            StatusReporter::new(queue.clone(), Arc::clone(&secrets)),
            queue,
            secrets,
        )
    }

    #[tokio::test]
    async fn payload_reflects_pending_signals() {
        let (reporter, queue, _) = reporter(2);
        queue.trigger().unwrap();
        queue.trigger().unwrap();
        assert!(queue.trigger().is_err());

        let payload = reporter.payload();
        assert_eq!(payload.pending_jobs, 2);
        assert_eq!(payload.active_jobs, 0);
        assert_eq!(payload.kind, "integrated");
    }

    #[test]
    fn data_url_embeds_json() {
        let (reporter, queue, _) = reporter(4);
        queue.trigger().unwrap();

        let url = reporter.data_url().unwrap();
        let json = url.strip_prefix("data:application/json,").unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"pending_jobs": 1, "active_jobs": 0, "type": "integrated"})
        );
    }

    #[test]
    fn snapshot_includes_secrets() {
        let (reporter, _, secrets) = reporter(1);
        secrets.set(HashMap::from([("TEAM_ID".to_string(), "ABC".to_string())]));
        let snapshot = reporter.snapshot();
        assert_eq!(snapshot.queue, QueueStatus::default());
        assert_eq!(snapshot.secrets.get("TEAM_ID").map(String::as_str), Some("ABC"));
    }
}
