// backend.rs — The narrow persistence interface the moderation core calls.
//
// Real deployments implement these traits over their own tables. The core
// only ever needs: point reads, partial writes, a uniqueness probe, the
// live flag, direct multi-value relation writes, and tag replacement.

use mq_changeset::{EntityId, FieldMap, FieldValue};
use serde::{Deserialize, Serialize};

use crate::error::EntityStoreError;

/// Which records a query can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every record, including ones still awaiting approval.
    All,
    /// Only records whose creation has been approved.
    Live,
}

/// A stored moderated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    /// Visible through normal (live) queries.
    pub is_live: bool,
    pub fields: FieldMap,
}

impl EntityRecord {
    pub fn is_visible(&self, visibility: Visibility) -> bool {
        match visibility {
            Visibility::All => true,
            Visibility::Live => self.is_live,
        }
    }
}

/// Persistence operations for moderated entities.
pub trait EntityStore {
    /// Load one entity as seen through `visibility`.
    fn get(
        &self,
        entity_type: &str,
        id: EntityId,
        visibility: Visibility,
    ) -> Result<Option<EntityRecord>, EntityStoreError>;

    /// All entities of a type as seen through `visibility`, in id order.
    fn list(
        &self,
        entity_type: &str,
        visibility: Visibility,
    ) -> Result<Vec<EntityRecord>, EntityStoreError>;

    /// Insert a new, non-live entity with the given columns.
    fn create_partial(
        &mut self,
        entity_type: &str,
        fields: &FieldMap,
    ) -> Result<EntityId, EntityStoreError>;

    /// Overwrite only the given columns of an existing entity.
    fn update_partial(
        &mut self,
        entity_type: &str,
        id: EntityId,
        fields: &FieldMap,
    ) -> Result<(), EntityStoreError>;

    /// Whether any entity other than `excluding` holds `value` in `field`.
    /// Checks every record, live or not, matching a table-wide constraint.
    fn exists_with_field_value(
        &self,
        entity_type: &str,
        field: &str,
        value: &FieldValue,
        excluding: Option<EntityId>,
    ) -> Result<bool, EntityStoreError>;

    /// Flip the visibility flag.
    fn set_live(
        &mut self,
        entity_type: &str,
        id: EntityId,
        live: bool,
    ) -> Result<(), EntityStoreError>;

    /// Replace a multi-value relation.
    fn set_related(
        &mut self,
        entity_type: &str,
        id: EntityId,
        field: &str,
        ids: &[EntityId],
    ) -> Result<(), EntityStoreError>;
}

/// The tagging subsystem.
pub trait TagStore {
    /// Replace every tag on an entity.
    fn set_tags(
        &mut self,
        entity_type: &str,
        id: EntityId,
        tags: &[String],
    ) -> Result<(), EntityStoreError>;

    /// Current tags of an entity, in stored order.
    fn tags(&self, entity_type: &str, id: EntityId) -> Result<Vec<String>, EntityStoreError>;
}
