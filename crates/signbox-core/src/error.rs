use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignboxError {
    #[error("job queue full")]
    QueueFull,

    #[error("job queue closed")]
    QueueClosed,

    #[error("no tokio runtime available to start the dispatcher")]
    NoRuntime,

    #[error("job processor already set")]
    ProcessorAlreadySet,

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("invalid upload id: {0:?}")]
    InvalidId(String),

    #[error("{op} upload id={id}: {source}")]
    Io {
        op: &'static str,
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("{op} {}: {source}", path.display())]
    Dir {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Config(String),

    #[error("encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SignboxError {
    /// Wrap an I/O error with the operation and the upload it concerns.
    pub fn io(op: &'static str, id: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            op,
            id: id.into(),
            source,
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }
}
