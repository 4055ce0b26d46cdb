// submission.rs — Turning a mutation into a changeset (or not).
//
// Pipeline:
//   1. validate every submitted field; nothing is written on failure
//   2. write multi-value relations directly (they are never staged)
//   3. bypass    → apply the rest now, mark live, no changeset
//      create    → write a hidden entity so it has an id, stage everything
//      update    → stage only the fields whose raw value changed

use std::sync::Arc;

use mq_changeset::{
    changed_fields, Changeset, ChangesetDraft, ChangesetStore, EntityId, EntityTypeDescriptor,
    FieldKind, FieldMap, FieldValue,
};
use mq_registry::{format_tags, parse_tags, Applier, EntityRecord, EntityStore, TagStore};

use crate::error::ModerationError;
use crate::events::ModerationEvent;
use crate::service::ModerationService;
use crate::validate::validate_fields;

/// A proposed mutation of one entity.
#[derive(Debug, Clone)]
pub struct Submission {
    pub entity_type: String,
    /// `None` proposes a new entity.
    pub entity_id: Option<EntityId>,
    pub fields: FieldMap,
    pub submitter: Option<String>,
    /// Skip the queue and apply immediately.
    pub bypass: bool,
}

impl Submission {
    pub fn create(entity_type: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: None,
            fields,
            submitter: None,
            bypass: false,
        }
    }

    pub fn update(entity_type: impl Into<String>, id: EntityId, fields: FieldMap) -> Self {
        Self {
            entity_id: Some(id),
            ..Self::create(entity_type, fields)
        }
    }

    pub fn by(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    pub fn bypass(mut self) -> Self {
        self.bypass = true;
        self
    }
}

/// Result of a submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The entity as it stands after the submission.
    pub entity: EntityRecord,
    /// The staged changeset; `None` when bypassed or nothing changed.
    pub changeset: Option<Changeset>,
}

/// Split off multi-value relations, canonicalize tag strings, and reduce
/// relation values to their integer id.
fn partition_fields(descriptor: &EntityTypeDescriptor, fields: FieldMap) -> (FieldMap, FieldMap) {
    let mut staged = FieldMap::new();
    let mut direct = FieldMap::new();
    for (name, value) in fields {
        match descriptor.field(&name).map(|f| &f.kind) {
            Some(FieldKind::ManyRelation { .. }) => {
                direct.insert(name, value);
            }
            Some(FieldKind::TagList) => {
                let value = match value {
                    FieldValue::Text(raw) => FieldValue::Text(format_tags(&parse_tags(&raw))),
                    other => other,
                };
                staged.insert(name, value);
            }
            Some(FieldKind::Relation { .. }) => {
                let value = value.as_entity_id().map_or_else(|| value.raw(), FieldValue::from);
                staged.insert(name, value);
            }
            _ => {
                staged.insert(name, value.raw());
            }
        }
    }
    (staged, direct)
}

impl<C, E> ModerationService<C, E>
where
    C: ChangesetStore,
    E: EntityStore + TagStore,
{
    /// Stage (or, with bypass, apply) a mutation.
    pub fn submit(&mut self, submission: Submission) -> Result<SubmitOutcome, ModerationError> {
        let Submission {
            entity_type,
            entity_id,
            fields,
            submitter,
            bypass,
        } = submission;

        let registry = Arc::clone(&self.registry);
        let descriptor = registry.descriptor(&entity_type)?;
        validate_fields(descriptor, &fields).map_err(ModerationError::Validation)?;
        if let Some(id) = entity_id {
            self.require_entity(&entity_type, id)?;
        }

        let (staged, direct) = partition_fields(descriptor, fields);
        let options = self.config.apply_options();
        let applier = Applier::new(&registry, &options);

        if bypass {
            let applied = applier
                .apply(&mut self.entities, &entity_type, entity_id, &staged)
                .map_err(|e| ModerationError::from_apply(None, e))?;
            self.write_direct(&entity_type, applied.entity_id, &direct)?;
            self.entities.set_live(&entity_type, applied.entity_id, true)?;
            tracing::info!(
                entity_type = %entity_type,
                entity_id = %applied.entity_id,
                "bypassed moderation, applied submission directly"
            );
            self.emit(ModerationEvent::SubmissionApplied {
                entity_type: entity_type.clone(),
                entity_id: applied.entity_id,
                submitter,
                timestamp: chrono::Utc::now(),
            });
            let entity = self.require_entity(&entity_type, applied.entity_id)?;
            return Ok(SubmitOutcome {
                entity,
                changeset: None,
            });
        }

        let (id, draft) = match entity_id {
            None => {
                let applied = applier
                    .apply(&mut self.entities, &entity_type, None, &staged)
                    .map_err(|e| ModerationError::from_apply(None, e))?;
                self.write_direct(&entity_type, applied.entity_id, &direct)?;
                let draft = ChangesetDraft::creation(
                    entity_type.as_str(),
                    Some(applied.entity_id),
                    staged,
                    submitter,
                );
                (applied.entity_id, draft)
            }
            Some(id) => {
                self.write_direct(&entity_type, id, &direct)?;
                let current = self.entity_fields(&entity_type, id)?.ok_or_else(|| {
                    ModerationError::EntityNotFound {
                        entity_type: entity_type.clone(),
                        id,
                    }
                })?;
                let changed = changed_fields(descriptor, &current, &staged);
                if changed.is_empty() {
                    tracing::debug!(entity_type = %entity_type, entity_id = %id, "no changes to stage");
                    let entity = self.require_entity(&entity_type, id)?;
                    return Ok(SubmitOutcome {
                        entity,
                        changeset: None,
                    });
                }
                (id, ChangesetDraft::update(entity_type.as_str(), id, changed, submitter))
            }
        };

        let changeset = self.changesets.create(draft)?;
        tracing::info!(
            changeset_id = %changeset.id,
            entity_type = %entity_type,
            entity_id = %id,
            status = %changeset.status,
            fields = changeset.proposed_fields.len(),
            "staged changeset"
        );
        self.emit(ModerationEvent::changeset_created(&changeset));

        let entity = self.require_entity(&entity_type, id)?;
        Ok(SubmitOutcome {
            entity,
            changeset: Some(changeset),
        })
    }

    fn write_direct(
        &mut self,
        entity_type: &str,
        id: EntityId,
        direct: &FieldMap,
    ) -> Result<(), ModerationError> {
        for (field, value) in direct {
            let ids = match value {
                FieldValue::IdList(ids) => ids.as_slice(),
                _ => &[],
            };
            self.entities.set_related(entity_type, id, field, ids)?;
            tracing::debug!(entity_type, entity_id = %id, field = %field, "wrote multi-value relation directly");
        }
        Ok(())
    }
}
