// service.rs — ModerationService: the facade callers talk to.
//
// The service owns the changeset store, the entity backend, the registry,
// the config, and the event dispatcher. Submission lives in submission.rs,
// approve/reject and the dependents scan in review.rs; this file holds the
// struct and the read-only queries a review surface needs.

use std::sync::Arc;

use mq_changeset::{
    compute_full_diff, Changeset, ChangesetId, ChangesetStore, DiffEntry, EntityId, FieldKind,
    FieldMap, FieldValue, ModerationStatus,
};
use mq_registry::{format_tags, EntityRecord, EntityRegistry, EntityStore, TagStore, Visibility};
use serde::{Deserialize, Serialize};

use crate::config::ModerationConfig;
use crate::error::ModerationError;
use crate::events::{EventDispatcher, ModerationEvent};

/// Moderation state of an entity as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityModerationStatus {
    /// Its creation has not been approved; hidden from live queries.
    Created,
    /// Live, with at least one edit awaiting review.
    Pending,
    /// Live with nothing outstanding.
    Approved,
}

impl std::fmt::Display for EntityModerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityModerationStatus::Created => write!(f, "created"),
            EntityModerationStatus::Pending => write!(f, "pending"),
            EntityModerationStatus::Approved => write!(f, "approved"),
        }
    }
}

/// A changeset together with its display diff.
#[derive(Debug, Clone, Serialize)]
pub struct ChangesetDiff {
    pub changeset: Changeset,
    pub diff: Vec<DiffEntry>,
}

/// Everything a reviewer sees for one changeset.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDetails {
    pub changeset: Changeset,
    pub diff: Vec<DiffEntry>,
    /// Unresolved changesets that reference this one's entity.
    pub dependents: Vec<ChangesetDiff>,
}

/// Staging, review, and query operations over one set of stores.
pub struct ModerationService<C, E> {
    pub(crate) registry: Arc<EntityRegistry>,
    pub(crate) changesets: C,
    pub(crate) entities: E,
    pub(crate) config: ModerationConfig,
    pub(crate) events: EventDispatcher,
}

impl<C, E> ModerationService<C, E>
where
    C: ChangesetStore,
    E: EntityStore + TagStore,
{
    pub fn new(
        registry: Arc<EntityRegistry>,
        changesets: C,
        entities: E,
        config: ModerationConfig,
    ) -> Self {
        Self {
            registry,
            changesets,
            entities,
            config,
            events: EventDispatcher::new(),
        }
    }

    /// Replace the event dispatcher (builder pattern).
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn changesets(&self) -> &C {
        &self.changesets
    }

    pub fn entities(&self) -> &E {
        &self.entities
    }

    /// Hand the stores back, e.g. to persist a snapshot.
    pub fn into_parts(self) -> (C, E) {
        (self.changesets, self.entities)
    }

    /// Unresolved changesets in id order, optionally for one type.
    pub fn list_pending(&self, entity_type: Option<&str>) -> Result<Vec<Changeset>, ModerationError> {
        if let Some(name) = entity_type {
            self.registry.descriptor(name)?;
        }
        Ok(self.changesets.list_unresolved(entity_type)?)
    }

    pub fn get_changeset(&self, id: ChangesetId) -> Result<Changeset, ModerationError> {
        self.changesets
            .get(id)?
            .ok_or(ModerationError::ChangesetNotFound(id))
    }

    /// Field-by-field view of what approving the changeset would change.
    pub fn compute_display_diff(&self, id: ChangesetId) -> Result<Vec<DiffEntry>, ModerationError> {
        let changeset = self.get_changeset(id)?;
        self.diff_for(&changeset)
    }

    /// The changeset, its diff, and each dependent with its own diff.
    pub fn review_details(&self, id: ChangesetId) -> Result<ReviewDetails, ModerationError> {
        let changeset = self.get_changeset(id)?;
        let diff = self.diff_for(&changeset)?;
        let dependents = self
            .dependents_of(&changeset)?
            .into_iter()
            .map(|dependent| {
                let diff = self.diff_for(&dependent)?;
                Ok(ChangesetDiff {
                    changeset: dependent,
                    diff,
                })
            })
            .collect::<Result<Vec<_>, ModerationError>>()?;

        Ok(ReviewDetails {
            changeset,
            diff,
            dependents,
        })
    }

    /// Whether an entity is awaiting creation, has edits pending, or is settled.
    pub fn entity_status(
        &self,
        entity_type: &str,
        id: EntityId,
    ) -> Result<EntityModerationStatus, ModerationError> {
        let record = self.require_entity(entity_type, id)?;
        if !record.is_live {
            return Ok(EntityModerationStatus::Created);
        }
        let outstanding = self
            .changesets
            .list_for_entity(entity_type, id)?
            .iter()
            .any(|cs| !cs.is_resolved());
        Ok(if outstanding {
            EntityModerationStatus::Pending
        } else {
            EntityModerationStatus::Approved
        })
    }

    pub fn list_entities(
        &self,
        entity_type: &str,
        visibility: Visibility,
    ) -> Result<Vec<EntityRecord>, ModerationError> {
        Ok(self.entities.list(entity_type, visibility)?)
    }

    /// Diff against the live record. A creation diffs against field
    /// defaults, since its entity already holds the proposed values.
    pub(crate) fn diff_for(&self, changeset: &Changeset) -> Result<Vec<DiffEntry>, ModerationError> {
        let descriptor = self.registry.descriptor(&changeset.entity_type)?;
        let current = match (changeset.status, changeset.entity_id) {
            (ModerationStatus::Created, _) | (_, None) => None,
            (_, Some(id)) => self.entity_fields(&changeset.entity_type, id)?,
        };
        Ok(compute_full_diff(
            descriptor,
            current.as_ref(),
            &changeset.proposed_fields,
        ))
    }

    pub(crate) fn require_entity(
        &self,
        entity_type: &str,
        id: EntityId,
    ) -> Result<EntityRecord, ModerationError> {
        self.entities
            .get(entity_type, id, Visibility::All)?
            .ok_or_else(|| ModerationError::EntityNotFound {
                entity_type: entity_type.to_string(),
                id,
            })
    }

    /// The entity's columns plus its tag fields rendered as raw strings, i.e.
    /// the shape a proposal is compared against. `None` if it is gone.
    pub(crate) fn entity_fields(
        &self,
        entity_type: &str,
        id: EntityId,
    ) -> Result<Option<FieldMap>, ModerationError> {
        let Some(record) = self.entities.get(entity_type, id, Visibility::All)? else {
            return Ok(None);
        };
        let descriptor = self.registry.descriptor(entity_type)?;
        let mut fields = record.fields;
        // The registry allows at most one tag field per type.
        if let Some(field) = descriptor
            .fields
            .iter()
            .find(|field| field.kind == FieldKind::TagList)
        {
            let tags = format_tags(&self.entities.tags(entity_type, id)?);
            fields.insert(field.name.clone(), FieldValue::Text(tags));
        }
        Ok(Some(fields))
    }

    pub(crate) fn emit(&self, event: ModerationEvent) {
        self.events.dispatch(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_changeset::{EntityTypeDescriptor, FieldDescriptor, MemoryChangesetStore};
    use mq_registry::MemoryEntityStore;

    use crate::submission::Submission;

    fn service() -> ModerationService<MemoryChangesetStore, MemoryEntityStore> {
        let registry = Arc::new(
            EntityRegistry::builder()
                .register(
                    EntityTypeDescriptor::new("post")
                        .with_field(FieldDescriptor::scalar("title"))
                        .with_field(FieldDescriptor::scalar("body").nullable().optional())
                        .with_field(FieldDescriptor::tags("tags")),
                )
                .unwrap()
                .build()
                .unwrap(),
        );
        ModerationService::new(
            registry.clone(),
            MemoryChangesetStore::new(),
            MemoryEntityStore::new(registry),
            ModerationConfig::default(),
        )
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn entity_status_follows_the_queue() {
        let mut svc = service();
        let created = svc
            .submit(Submission::create(
                "post",
                fields(&[("title", FieldValue::text("Hi"))]),
            ))
            .unwrap();
        let id = created.entity.id;
        let cs = created.changeset.unwrap();
        assert_eq!(svc.entity_status("post", id).unwrap(), EntityModerationStatus::Created);

        svc.approve(cs.id, "mod", "").unwrap();
        assert_eq!(svc.entity_status("post", id).unwrap(), EntityModerationStatus::Approved);

        svc.submit(Submission::update(
            "post",
            id,
            fields(&[("title", FieldValue::text("Hello"))]),
        ))
        .unwrap();
        assert_eq!(svc.entity_status("post", id).unwrap(), EntityModerationStatus::Pending);
    }

    #[test]
    fn creation_diff_is_against_defaults() {
        let mut svc = service();
        let outcome = svc
            .submit(Submission::create(
                "post",
                fields(&[("title", FieldValue::text("Hi"))]),
            ))
            .unwrap();
        let diff = svc
            .compute_display_diff(outcome.changeset.unwrap().id)
            .unwrap();

        assert_eq!(diff.len(), 3);
        assert_eq!(diff[0].field, "title");
        assert_eq!(diff[0].old_value, FieldValue::Null);
        assert_eq!(diff[0].new_value, FieldValue::text("Hi"));
        assert!(diff[0].changed);
        assert!(!diff[1].changed);
    }

    #[test]
    fn tags_show_up_in_entity_fields() {
        let mut svc = service();
        let outcome = svc
            .submit(
                Submission::create(
                    "post",
                    fields(&[
                        ("title", FieldValue::text("Hi")),
                        ("tags", FieldValue::text("a b")),
                    ]),
                )
                .bypass(),
            )
            .unwrap();
        let fields = svc.entity_fields("post", outcome.entity.id).unwrap().unwrap();
        assert_eq!(fields["tags"], FieldValue::text("a, b"));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let svc = service();
        assert!(svc.get_changeset(ChangesetId(9)).unwrap_err().is_not_found());
        assert!(svc.entity_status("post", EntityId(9)).unwrap_err().is_not_found());
        assert!(matches!(
            svc.list_pending(Some("film")),
            Err(ModerationError::UnknownType(_))
        ));
    }
}
