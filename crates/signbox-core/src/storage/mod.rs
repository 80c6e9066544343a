//! Storage module: uploads kept as files in one directory.
//!
//! # Directory contract
//! - names starting with `.` are ignored everywhere (also used for eviction tombstones)
//! - `<id>.info` is the JSON sidecar of upload `<id>`, never an upload itself
//! - every other entry is an upload whose id is its file name

mod cleanup_loop;
mod layout;
mod resolver;
mod upload;

pub use cleanup_loop::{CleanupHandle, CleanupLoop};
pub use layout::{SIDECAR_EXTENSION, is_hidden, is_sidecar, validate_id};
pub use resolver::{CleanupReport, UploadResolver};
pub use upload::{Upload, UploadInfo};
