//! Upload handle and its sidecar metadata.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layout::{SIDECAR_EXTENSION, TOMBSTONE_PREFIX};
use crate::error::SignboxError;

/// Metadata stored next to an upload as `<id>.info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    /// Name the client uploaded the file under.
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

impl UploadInfo {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
struct UploadInner {
    id: String,
    path: PathBuf,
    info_path: PathBuf,
    deleted: AtomicBool,
}

/// Handle to one upload.
///
/// Clones share state. The resolver table decides whether an upload exists;
/// a handle held after eviction only reports `is_deleted()`.
#[derive(Debug, Clone)]
pub struct Upload {
    inner: Arc<UploadInner>,
}

impl Upload {
    pub(crate) fn new(dir: &Path, id: &str) -> Self {
        Self {
            inner: Arc::new(UploadInner {
                id: id.to_string(),
                path: dir.join(id),
                info_path: dir.join(format!("{id}.{SIDECAR_EXTENSION}")),
                deleted: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::Acquire)
    }

    /// Last modification time of the backing file, read from disk on every call.
    pub fn mod_time(&self) -> io::Result<DateTime<Utc>> {
        let modified = fs::metadata(&self.inner.path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), SignboxError> {
        fs::write(&self.inner.path, bytes).map_err(|e| SignboxError::io("write", self.id(), e))
    }

    pub fn read(&self) -> Result<Vec<u8>, SignboxError> {
        fs::read(&self.inner.path).map_err(|e| SignboxError::io("read", self.id(), e))
    }

    pub fn set_info(&self, info: &UploadInfo) -> Result<(), SignboxError> {
        let json = serde_json::to_vec_pretty(info).map_err(|e| {
            SignboxError::io("write info", self.id(), io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        fs::write(&self.inner.info_path, json)
            .map_err(|e| SignboxError::io("write info", self.id(), e))
    }

    /// Sidecar metadata, `None` when the upload has none.
    pub fn info(&self) -> Result<Option<UploadInfo>, SignboxError> {
        let bytes = match fs::read(&self.inner.info_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SignboxError::io("read info", self.id(), e)),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            SignboxError::io("read info", self.id(), io::Error::new(io::ErrorKind::InvalidData, e))
        })
    }

    /// Create (or truncate) the backing file.
    pub(crate) fn create(&self) -> io::Result<()> {
        fs::File::create(&self.inner.path).map(|_| ())
    }

    /// Mark the handle deleted and move its files to hidden tombstone names.
    ///
    /// Renames are cheap and keep the id's real path free as soon as this
    /// returns; the actual removal happens in [`Tombstone::purge`].
    pub(crate) fn detach(&self, seq: u64) -> io::Result<Tombstone> {
        self.inner.deleted.store(true, Ordering::Release);
        let dir = self.inner.path.parent().unwrap_or_else(|| Path::new("."));
        let base = format!("{TOMBSTONE_PREFIX}{seq}-{}", self.inner.id);

        let mut paths = Vec::with_capacity(2);
        for (from, to) in [
            (&self.inner.path, dir.join(&base)),
            (
                &self.inner.info_path,
                dir.join(format!("{base}.{SIDECAR_EXTENSION}")),
            ),
        ] {
            match fs::rename(from, &to) {
                Ok(()) => paths.push(to),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Tombstone {
            id: self.inner.id.clone(),
            paths,
        })
    }
}

/// Files of a detached upload waiting to be removed.
#[derive(Debug)]
pub(crate) struct Tombstone {
    pub(crate) id: String,
    paths: Vec<PathBuf>,
}

impl Tombstone {
    pub(crate) fn from_path(id: String, path: PathBuf) -> Self {
        Self {
            id,
            paths: vec![path],
        }
    }

    pub(crate) fn purge(self) -> io::Result<()> {
        for path in &self.paths {
            remove_entry(path)?;
        }
        Ok(())
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
