//! Dispatcher loop and per-job execution.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::time::Instant;

use super::job_queue::WorkerCore;
use super::{JobContext, JobId, JobProcessor, JobSignal, JobState};

/// Owns the worker slot for one job and keeps `active` raised while the job
/// task is alive, including while it unwinds.
///
/// `active` is lowered in `drop` before the permit field is released, so the
/// next job can never push the counter above one.
struct ActiveGuard {
    core: Arc<WorkerCore>,
    _slot: OwnedSemaphorePermit,
}

impl ActiveGuard {
    fn enter(core: Arc<WorkerCore>, slot: OwnedSemaphorePermit) -> Self {
        core.active.fetch_add(1, Ordering::AcqRel);
        Self { core, _slot: slot }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.core.active.fetch_sub(1, Ordering::AcqRel);
    }
}

fn transition(job_id: JobId, state: &mut JobState, next: JobState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid job transition {state} -> {next}"
    );
    tracing::trace!(%job_id, from = %state, to = %next, "job state");
    *state = next;
}

/// Consume signals until every sender is dropped.
pub(super) async fn run(core: Arc<WorkerCore>, mut rx: mpsc::Receiver<JobSignal>) {
    while let Some(JobSignal) = rx.recv().await {
        let job_id = core.next_job_id();
        let mut state = JobState::Queued;

        // Waits here (not in trigger) until the previous job gives the slot back.
        let Ok(permit) = Arc::clone(&core.slot).acquire_owned().await else {
            tracing::error!("worker slot closed, dispatcher stopping");
            break;
        };
        transition(job_id, &mut state, JobState::Dispatching);

        let Some(processor) = core.processor.get().cloned() else {
            tracing::warn!(%job_id, "job processor not set, signal dropped");
            transition(job_id, &mut state, JobState::Completed);
            continue;
        };

        let guard = ActiveGuard::enter(Arc::clone(&core), permit);
        let ctx = JobContext::new(job_id, core.timeout);
        tokio::spawn(execute(processor, ctx, state, guard));
    }
    tracing::debug!("job dispatcher stopped");
}

async fn execute(
    processor: Arc<dyn JobProcessor>,
    ctx: JobContext,
    mut state: JobState,
    _guard: ActiveGuard,
) {
    let job_id = ctx.job_id;
    transition(job_id, &mut state, JobState::Running);
    let started = Instant::now();

    match processor.process(ctx).await {
        Ok(()) => {
            transition(job_id, &mut state, JobState::Completed);
            tracing::info!(
                %job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "job completed"
            );
        }
        Err(e) => {
            transition(job_id, &mut state, JobState::Failed);
            tracing::error!(
                %job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "job failed"
            );
        }
    }
    if ctx.is_expired() {
        tracing::warn!(%job_id, timeout_secs = ctx.timeout.as_secs(), "job ran past its deadline");
    }
}
