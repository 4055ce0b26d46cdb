// error.rs — Error types for the registry, entity persistence, and apply.

use std::path::PathBuf;

use mq_changeset::EntityId;
use thiserror::Error;

/// Errors raised while building or querying the type registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The same type name was registered twice.
    #[error("entity type '{0}' is already registered")]
    DuplicateType(String),

    /// No descriptor is registered under this name.
    #[error("unknown entity type '{0}'")]
    UnknownType(String),

    /// A relation field points at a type that was never registered.
    #[error("field {entity_type}.{field} references unregistered type '{target}'")]
    UnknownRelationTarget {
        entity_type: String,
        field: String,
        target: String,
    },

    /// Tags are stored per entity, so a type can carry at most one tag field.
    #[error("entity type '{entity_type}' declares more than one tag field")]
    MultipleTagFields { entity_type: String },
}

/// Errors reported by an entity persistence backend.
#[derive(Debug, Error)]
pub enum EntityStoreError {
    /// The entity does not exist.
    #[error("{entity_type} #{id} not found")]
    NotFound { entity_type: String, id: EntityId },

    /// A uniqueness or foreign-key constraint was violated.
    #[error("integrity violation on {entity_type}: {message}")]
    Conflict { entity_type: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize stored entities.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors raised while writing a changeset's fields into an entity.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Integrity violation the apply routine could not resolve.
    #[error("apply conflict: {0}")]
    Conflict(String),

    /// Slug disambiguation gave up.
    #[error("could not find a free value for {field} after {attempts} attempts")]
    SlugExhausted { field: String, attempts: usize },

    /// A proposed value does not fit its field kind.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// The entity to update no longer exists.
    #[error("{entity_type} #{id} no longer exists")]
    EntityMissing { entity_type: String, id: EntityId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Any other backend failure.
    #[error("entity store error: {0}")]
    Store(EntityStoreError),
}

impl ApplyError {
    /// True for integrity failures (constraint violations, exhausted slugs).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ApplyError::Conflict(_) | ApplyError::SlugExhausted { .. }
        )
    }
}

impl From<EntityStoreError> for ApplyError {
    fn from(err: EntityStoreError) -> Self {
        match err {
            EntityStoreError::Conflict { message, .. } => ApplyError::Conflict(message),
            EntityStoreError::NotFound { entity_type, id } => {
                ApplyError::EntityMissing { entity_type, id }
            }
            EntityStoreError::Registry(e) => ApplyError::Registry(e),
            other => ApplyError::Store(other),
        }
    }
}
