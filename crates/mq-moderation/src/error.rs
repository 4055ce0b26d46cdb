// error.rs — Error types for submission, review, and event delivery.

use std::path::PathBuf;

use mq_changeset::{ChangeSetError, ChangesetId, EntityId};
use mq_registry::{ApplyError, EntityStoreError, RegistryError};
use thiserror::Error;

use crate::validate::FieldIssue;

/// Errors raised by the moderation service.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The requested changeset does not exist.
    #[error("changeset {0} not found")]
    ChangesetNotFound(ChangesetId),

    /// The requested entity does not exist.
    #[error("{entity_type} #{id} not found")]
    EntityNotFound { entity_type: String, id: EntityId },

    /// The changeset pointed at nothing usable and has been deleted.
    #[error("changeset {id} is invalid and was removed: {reason}")]
    InvalidChangeset { id: ChangesetId, reason: String },

    /// Applying the proposed fields violated an integrity constraint.
    /// `id` is `None` for bypassed submissions, which have no changeset.
    #[error("{}", apply_conflict_message(.id, .message))]
    ApplyConflict {
        id: Option<ChangesetId>,
        message: String,
    },

    /// The submission was rejected before anything was persisted.
    #[error("validation failed: {}", join_issues(.0))]
    Validation(Vec<FieldIssue>),

    /// The changeset is not in a status that allows this operation.
    #[error("invalid status transition from {from} to {to} for changeset {id}")]
    InvalidTransition {
        id: ChangesetId,
        from: String,
        to: String,
    },

    /// Proposed fields no longer match the hash recorded at creation.
    #[error("changeset {0} was modified after submission")]
    TamperedChangeset(ChangesetId),

    #[error("unknown entity type '{0}'")]
    UnknownType(String),

    #[error(transparent)]
    Registry(RegistryError),

    /// Changeset persistence failed.
    #[error("changeset store error: {0}")]
    Store(ChangeSetError),

    /// Entity persistence failed.
    #[error("entity store error: {0}")]
    Backend(EntityStoreError),
}

fn apply_conflict_message(id: &Option<ChangesetId>, message: &str) -> String {
    match id {
        Some(id) => format!("apply conflict for changeset {}: {}", id, message),
        None => format!("apply conflict: {}", message),
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ModerationError {
    /// Attach changeset context to an apply failure.
    pub(crate) fn from_apply(id: Option<ChangesetId>, err: ApplyError) -> Self {
        match err {
            ApplyError::Registry(e) => e.into(),
            ApplyError::Store(e) => ModerationError::Backend(e),
            ApplyError::EntityMissing { entity_type, id } => {
                ModerationError::EntityNotFound { entity_type, id }
            }
            other => ModerationError::ApplyConflict {
                id,
                message: other.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ModerationError::ChangesetNotFound(_) | ModerationError::EntityNotFound { .. }
        )
    }
}

impl From<ChangeSetError> for ModerationError {
    fn from(err: ChangeSetError) -> Self {
        match err {
            ChangeSetError::InvalidTransition { id, from, to } => {
                ModerationError::InvalidTransition { id, from, to }
            }
            other => ModerationError::Store(other),
        }
    }
}

impl From<RegistryError> for ModerationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownType(name) => ModerationError::UnknownType(name),
            other => ModerationError::Registry(other),
        }
    }
}

impl From<EntityStoreError> for ModerationError {
    fn from(err: EntityStoreError) -> Self {
        match err {
            EntityStoreError::NotFound { entity_type, id } => {
                ModerationError::EntityNotFound { entity_type, id }
            }
            EntityStoreError::Registry(e) => e.into(),
            EntityStoreError::Conflict { message, .. } => {
                ModerationError::ApplyConflict { id: None, message }
            }
            other => ModerationError::Backend(other),
        }
    }
}

/// Errors raised by a notification sink. Logged, never propagated.
#[derive(Debug, Error)]
pub enum EventError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
