//! CleanupLoop - periodic upload eviction
//!
//! # Flow
//! 1. every `interval`, run `UploadResolver::cleanup(ttl)` on the blocking pool
//! 2. log the sweep report
//! 3. stop when the shutdown signal flips

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CleanupReport, UploadResolver};
use crate::config::StorageConfig;
use crate::error::SignboxError;

pub struct CleanupLoop {
    resolver: Arc<UploadResolver>,
    ttl: Duration,
    interval: Duration,
}

/// Handle to a spawned cleanup loop.
/// - `request_shutdown()` stops it after the sweep in progress, if any
/// - `shutdown_and_join()` also waits for it
pub struct CleanupHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CleanupHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "cleanup loop task failed");
        }
    }
}

impl CleanupLoop {
    pub fn new(resolver: Arc<UploadResolver>, ttl: Duration, interval: Duration) -> Self {
        Self {
            resolver,
            ttl,
            interval,
        }
    }

    pub fn from_config(
        resolver: Arc<UploadResolver>,
        config: &StorageConfig,
    ) -> Result<Self, SignboxError> {
        config.validate()?;
        Ok(Self::new(
            resolver,
            config.upload_ttl(),
            config.cleanup_interval(),
        ))
    }

    /// One sweep, off the async worker threads.
    pub async fn sweep_once(&self) -> CleanupReport {
        let resolver = Arc::clone(&self.resolver);
        let ttl = self.ttl;
        match tokio::task::spawn_blocking(move || resolver.cleanup(ttl)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "cleanup sweep task failed");
                CleanupReport::default()
            }
        }
    }

    /// Sweep on every tick until `shutdown` turns true or its sender is dropped.
    /// The first sweep runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            dir = %self.resolver.dir().display(),
            "cleanup loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    tracing::debug!(
                        marked = report.marked(),
                        deleted = report.deleted,
                        failed = report.failed,
                        "cleanup sweep finished"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("cleanup loop stopped");
    }

    pub fn spawn(self) -> CleanupHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        CleanupHandle { shutdown_tx, join }
    }
}
