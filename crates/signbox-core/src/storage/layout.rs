use std::path::Path;

use crate::error::SignboxError;

/// Extension of metadata sidecar files.
pub const SIDECAR_EXTENSION: &str = "info";

/// Prefix of files an eviction has moved out of the way but not yet removed.
pub(crate) const TOMBSTONE_PREFIX: &str = ".evict-";

/// Hidden entries (`.DS_Store`, tombstones, ...) are never uploads.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

pub fn is_sidecar(name: &str) -> bool {
    Path::new(name).extension().and_then(|e| e.to_str()) == Some(SIDECAR_EXTENSION)
}

pub(crate) fn is_tombstone(name: &str) -> bool {
    name.starts_with(TOMBSTONE_PREFIX)
}

/// Directory entries that stand for an upload.
pub(crate) fn is_upload_name(name: &str) -> bool {
    !is_hidden(name) && !is_sidecar(name)
}

/// An id must name exactly one visible, non-sidecar entry inside the uploads directory.
pub fn validate_id(id: &str) -> Result<(), SignboxError> {
    let single_component = !id.is_empty()
        && id != ".."
        && !id.contains('/')
        && !id.contains('\\')
        && !id.contains('\0');
    if single_component && is_upload_name(id) {
        Ok(())
    } else {
        Err(SignboxError::InvalidId(id.to_string()))
    }
}
