// error.rs — Error types for the changeset subsystem.

use std::path::PathBuf;

use thiserror::Error;

use crate::changeset::ChangesetId;

/// Errors that can occur during changeset operations.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// Invalid status transition (e.g., Approved → Rejected).
    #[error("invalid status transition from {from} to {to} for changeset {id}")]
    InvalidTransition {
        id: ChangesetId,
        from: String,
        to: String,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or malformed data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
