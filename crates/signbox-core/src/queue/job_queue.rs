//! Bounded, single-flight job queue.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::dispatcher;
use super::{JobId, JobProcessor, JobSignal, QueueStatus};
use crate::config::IntegratedConfig;
use crate::error::SignboxError;

/// State shared between the queue handle, the dispatcher and the job tasks.
///
/// Holds no channel sender, so the dispatcher exits once every `JobQueue`
/// handle is gone and the buffer drains.
pub(super) struct WorkerCore {
    pub(super) processor: OnceLock<Arc<dyn JobProcessor>>,
    /// The worker slot: one permit, held for the whole processing invocation.
    pub(super) slot: Arc<Semaphore>,
    pub(super) active: AtomicUsize,
    next_job_id: AtomicU64,
    pub(super) timeout: Duration,
}

impl WorkerCore {
    pub(super) fn next_job_id(&self) -> JobId {
        JobId::new(self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

struct Shared {
    tx: mpsc::Sender<JobSignal>,
    /// Taken exactly once by `start`.
    rx: Mutex<Option<mpsc::Receiver<JobSignal>>>,
    core: Arc<WorkerCore>,
}

/// Accepts trigger signals and runs the injected processor for each, one at a time.
///
/// # Flow
/// 1. `trigger()` puts a `JobSignal` into a bounded buffer (never waits)
/// 2. the dispatcher pops signals in arrival order and acquires the worker slot
/// 3. a job task runs the processor and releases the slot when it finishes
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
}

impl JobQueue {
    /// Create a queue buffering up to `capacity` signals. Zero is a `Config` error.
    pub fn new(capacity: usize, job_timeout: Duration) -> Result<Self, SignboxError> {
        if capacity == 0 {
            return Err(SignboxError::Config(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        let core = Arc::new(WorkerCore {
            processor: OnceLock::new(),
            slot: Arc::new(Semaphore::new(1)),
            active: AtomicUsize::new(0),
            next_job_id: AtomicU64::new(0),
            timeout: job_timeout,
        });
        Ok(Self {
            shared: Arc::new(Shared {
                tx,
                rx: Mutex::new(Some(rx)),
                core,
            }),
        })
    }

    pub fn from_config(config: &IntegratedConfig) -> Result<Self, SignboxError> {
        config.validate()?;
        Self::new(config.queue_capacity, config.job_timeout())
    }

    /// Inject the processor and start the dispatcher.
    ///
    /// The processor can be set once. Outside a Tokio runtime this fails with
    /// `NoRuntime` and leaves the processor unset, so the call can be retried
    /// from inside one.
    pub fn set_processor<P>(&self, processor: P) -> Result<(), SignboxError>
    where
        P: JobProcessor + 'static,
    {
        self.set_shared_processor(Arc::new(processor))
    }

    pub fn set_shared_processor(
        &self,
        processor: Arc<dyn JobProcessor>,
    ) -> Result<(), SignboxError> {
        tokio::runtime::Handle::try_current().map_err(|_| SignboxError::NoRuntime)?;
        self.shared
            .core
            .processor
            .set(processor)
            .map_err(|_| SignboxError::ProcessorAlreadySet)?;
        self.start()?;
        Ok(())
    }

    pub fn has_processor(&self) -> bool {
        self.shared.core.processor.get().is_some()
    }

    /// Spawn the dispatcher on the current runtime.
    ///
    /// Idempotent: returns `Ok(true)` for the call that actually started it and
    /// `Ok(false)` for every other call, concurrent or later.
    pub fn start(&self) -> Result<bool, SignboxError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| SignboxError::NoRuntime)?;
        let rx = {
            let mut guard = self.shared.rx.lock().unwrap_or_else(|e| e.into_inner());
            match guard.take() {
                Some(rx) => rx,
                None => return Ok(false),
            }
        };
        handle.spawn(dispatcher::run(Arc::clone(&self.shared.core), rx));
        tracing::debug!(
            capacity = self.capacity(),
            timeout_secs = self.shared.core.timeout.as_secs(),
            "job dispatcher started"
        );
        Ok(true)
    }

    pub fn is_started(&self) -> bool {
        self.shared
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Enqueue one signal without waiting.
    ///
    /// A full buffer is reported as `QueueFull` right away; the buffer is left as is.
    pub fn trigger(&self) -> Result<(), SignboxError> {
        match self.shared.tx.try_send(JobSignal) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity(), "job queue full, trigger rejected");
                Err(SignboxError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SignboxError::QueueClosed),
        }
    }

    pub fn status(&self) -> QueueStatus {
        let tx = &self.shared.tx;
        QueueStatus {
            pending_jobs: tx.max_capacity() - tx.capacity(),
            active_jobs: self.shared.core.active.load(Ordering::Acquire),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.tx.max_capacity()
    }

    pub fn job_timeout(&self) -> Duration {
        self.shared.core.timeout
    }
}
