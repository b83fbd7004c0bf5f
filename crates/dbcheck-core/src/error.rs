//! Error taxonomy for the database check.

use std::path::PathBuf;

use crate::record::RecordKey;

/// Errors produced while constructing a single [`Record`](crate::Record).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("sketch id must not be empty")]
    EmptySketchId,

    #[error("board id must not be empty")]
    EmptyBoardId,

    #[error("unrecognized status: {0:?}")]
    UnknownStatus(String),
}

/// Errors produced by loading and reconciling compilation outcomes.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("malformed record in {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error(
        "duplicate key {key} in {} (first seen in {})",
        second.display(),
        first.display()
    )]
    DuplicateKey {
        key: RecordKey,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CheckError::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for database check operations.
pub type Result<T> = std::result::Result<T, CheckError>;
