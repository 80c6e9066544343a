//! Upload resolver: the in-memory table of uploads and its reconciliation with disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::layout::{is_tombstone, is_upload_name, validate_id};
use super::upload::{Tombstone, Upload};
use crate::clock::{Clock, SystemClock};
use crate::error::SignboxError;

/// Outcome of one `cleanup` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Tracked uploads judged expired (including unreadable ones).
    pub expired: usize,
    /// Untracked entries on disk judged expired.
    pub orphans: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl CleanupReport {
    pub fn marked(&self) -> usize {
        self.expired + self.orphans
    }
}

/// Registry of uploads backed by a directory.
///
/// All table mutations happen under one mutex. Removing files from disk
/// happens after the lock is released: evicted and deleted uploads are first
/// renamed to hidden tombstones while the lock is held, so an `add` racing
/// with a delete of the same id always keeps its fresh file.
pub struct UploadResolver {
    dir: PathBuf,
    table: Mutex<HashMap<String, Upload>>,
    clock: Arc<dyn Clock>,
    tombstone_seq: AtomicU64,
}

impl UploadResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            table: Mutex::new(HashMap::new()),
            clock,
            tombstone_seq: AtomicU64::new(0),
        }
    }

    /// Create the directory if needed and load whatever is already in it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SignboxError> {
        let resolver = Self::new(dir);
        fs::create_dir_all(&resolver.dir).map_err(|e| SignboxError::Dir {
            op: "create uploads dir",
            path: resolver.dir.clone(),
            source: e,
        })?;
        resolver.refresh()?;
        Ok(resolver)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Upload>> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_seq(&self) -> u64 {
        self.tombstone_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn read_dir_names(&self, op: &'static str) -> Result<Vec<String>, SignboxError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| SignboxError::Dir {
            op,
            path: self.dir.clone(),
            source: e,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SignboxError::Dir {
                op,
                path: self.dir.clone(),
                source: e,
            })?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => tracing::warn!(?name, "skipping non utf-8 entry in uploads dir"),
            }
        }
        Ok(names)
    }

    /// Register a new upload and create its (empty) backing file.
    ///
    /// Replaces any handle already registered under `id`.
    pub fn add(&self, id: &str) -> Result<Upload, SignboxError> {
        validate_id(id)?;
        let upload = Upload::new(&self.dir, id);
        let mut table = self.table();
        upload
            .create()
            .map_err(|e| SignboxError::io("add", id, e))?;
        table.insert(id.to_string(), upload.clone());
        Ok(upload)
    }

    /// Table lookup only; never loads from disk.
    pub fn get(&self, id: &str) -> Option<Upload> {
        self.table().get(id).cloned()
    }

    /// Remove an upload. Unknown ids are a no-op.
    pub fn delete(&self, id: &str) -> Result<(), SignboxError> {
        let tombstone = {
            let mut table = self.table();
            let Some(upload) = table.remove(id) else {
                return Ok(());
            };
            upload
                .detach(self.next_seq())
                .map_err(|e| SignboxError::io("delete", id, e))?
        };
        tombstone
            .purge()
            .map_err(|e| SignboxError::io("delete", id, e))
    }

    /// Load a handle for every upload found in the directory.
    ///
    /// Hidden entries and sidecars are skipped. Tombstones left behind by an
    /// interrupted eviction are removed.
    pub fn refresh(&self) -> Result<(), SignboxError> {
        let mut leftovers = Vec::new();
        {
            let mut table = self.table();
            for name in self.read_dir_names("read uploads dir")? {
                if is_tombstone(&name) {
                    leftovers.push(Tombstone::from_path(name.clone(), self.dir.join(&name)));
                    continue;
                }
                if !is_upload_name(&name) {
                    continue;
                }
                let upload = Upload::new(&self.dir, &name);
                table.insert(name, upload);
            }
            tracing::debug!(count = table.len(), "uploads refreshed");
        }
        for tombstone in leftovers {
            let entry = tombstone.id.clone();
            if let Err(e) = tombstone.purge() {
                tracing::warn!(%entry, error = %e, "leftover tombstone removal failed");
            }
        }
        Ok(())
    }

    /// Evict uploads not modified within `ttl`.
    ///
    /// Both tracked uploads and untracked ("orphan") entries on disk are
    /// judged. An upload is expired when `now > mod_time + ttl`; one exactly
    /// `ttl` old is kept. A tracked upload whose modification time cannot be
    /// read counts as expired.
    ///
    /// Failures on single items are logged and counted; the sweep always
    /// covers every marked item.
    pub fn cleanup(&self, ttl: Duration) -> CleanupReport {
        let now = self.clock.now();
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let mut report = CleanupReport::default();
        let mut tombstones = Vec::new();

        {
            let mut table = self.table();
            let mut marked = Vec::new();

            for (id, upload) in table.iter() {
                match upload.mod_time() {
                    Ok(modified) if !is_expired(now, modified, ttl) => {}
                    Ok(_) => {
                        report.expired += 1;
                        marked.push(upload.clone());
                    }
                    Err(e) => {
                        tracing::warn!(%id, error = %e, "upload mod time unreadable, evicting");
                        report.expired += 1;
                        marked.push(upload.clone());
                    }
                }
            }

            match self.read_dir_names("scan uploads dir") {
                Ok(names) => {
                    for name in names {
                        if !is_upload_name(&name) || table.contains_key(&name) {
                            continue;
                        }
                        let path = self.dir.join(&name);
                        let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
                            continue;
                        };
                        if is_expired(now, DateTime::<Utc>::from(modified), ttl) {
                            report.orphans += 1;
                            marked.push(Upload::new(&self.dir, &name));
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "orphan scan skipped"),
            }

            for upload in marked {
                table.remove(upload.id());
                match upload.detach(self.next_seq()) {
                    Ok(tombstone) => tombstones.push(tombstone),
                    Err(e) => {
                        tracing::warn!(id = %upload.id(), error = %e, "upload cleanup");
                        report.failed += 1;
                    }
                }
            }
        }

        for tombstone in tombstones {
            let id = tombstone.id.clone();
            match tombstone.purge() {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "upload cleanup");
                    report.failed += 1;
                }
            }
        }

        if report.marked() > 0 {
            tracing::info!(
                expired = report.expired,
                orphans = report.orphans,
                deleted = report.deleted,
                failed = report.failed,
                "cleaned up upload files"
            );
        }
        report
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.table().keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn is_expired(now: DateTime<Utc>, modified: DateTime<Utc>, ttl: TimeDelta) -> bool {
    match modified.checked_add_signed(ttl) {
        Some(deadline) => now > deadline,
        None => false,
    }
}
