// apply.rs — Writing proposed fields into an entity.
//
// Each proposed value is prepared according to its field kind:
//   Scalar         → written as is; unique text fields are disambiguated
//   Relation       → bare id resolved to a Ref of the target type
//   FileReference  → name wrapped in a FileRef under the media root
//   TagList        → parsed and handed to the TagStore after the row write
//   ManyRelation   → never applied from a changeset
// Unknown and non-editable fields are skipped, as is NULL for any field that
// is not both nullable and optional.

use std::path::PathBuf;

use mq_changeset::{
    EntityId, EntityRef, EntityTypeDescriptor, FieldDescriptor, FieldKind, FieldMap, FieldValue,
    FileRef,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backend::{EntityStore, TagStore, Visibility};
use crate::error::{ApplyError, EntityStoreError};
use crate::registry::EntityRegistry;
use crate::tags::parse_tags;

/// Longest value a unique short text field may hold.
pub const DEFAULT_SLUG_MAX_LENGTH: usize = 50;

/// Random disambiguation attempts before giving up.
pub const DEFAULT_SLUG_MAX_ATTEMPTS: usize = 100;

/// Tunables for the apply routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Base directory that file-reference names are joined to.
    pub media_root: PathBuf,
    pub slug_max_length: usize,
    pub slug_max_attempts: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            slug_max_length: DEFAULT_SLUG_MAX_LENGTH,
            slug_max_attempts: DEFAULT_SLUG_MAX_ATTEMPTS,
        }
    }
}

/// Columns and tags ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedWrite {
    pub columns: FieldMap,
    pub tags: Option<Vec<String>>,
    /// Proposed fields that will be written (columns and tags).
    pub written: Vec<String>,
    /// Proposed fields that were deliberately not written.
    pub skipped: Vec<String>,
}

/// What an apply did.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub entity_id: EntityId,
    /// The entity was created by this apply.
    pub created: bool,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// Applies proposed field maps to entities of registered types.
pub struct Applier<'a> {
    registry: &'a EntityRegistry,
    options: &'a ApplyOptions,
}

impl<'a> Applier<'a> {
    pub fn new(registry: &'a EntityRegistry, options: &'a ApplyOptions) -> Self {
        Self { registry, options }
    }

    /// Write `proposed` into the entity, creating it when `entity_id` is None.
    ///
    /// Issues a partial update: fields absent from `proposed` are untouched.
    pub fn apply<S>(
        &self,
        store: &mut S,
        entity_type: &str,
        entity_id: Option<EntityId>,
        proposed: &FieldMap,
    ) -> Result<AppliedChange, ApplyError>
    where
        S: EntityStore + TagStore + ?Sized,
    {
        let descriptor = self.registry.descriptor(entity_type)?;
        let prepared = self.prepare(&*store, descriptor, entity_id, proposed)?;

        let (id, created) = match entity_id {
            Some(id) => {
                if store.get(entity_type, id, Visibility::All)?.is_none() {
                    return Err(ApplyError::EntityMissing {
                        entity_type: entity_type.to_string(),
                        id,
                    });
                }
                if !prepared.columns.is_empty() {
                    store.update_partial(entity_type, id, &prepared.columns)?;
                }
                (id, false)
            }
            None => (store.create_partial(entity_type, &prepared.columns)?, true),
        };

        if let Some(tags) = &prepared.tags {
            store.set_tags(entity_type, id, tags)?;
        }

        tracing::info!(
            entity_type,
            entity_id = %id,
            created,
            written = prepared.written.len(),
            skipped = prepared.skipped.len(),
            "applied proposed fields"
        );

        Ok(AppliedChange {
            entity_id: id,
            created,
            written: prepared.written,
            skipped: prepared.skipped,
        })
    }

    /// Turn proposed raw values into the values the store should receive.
    pub fn prepare<S>(
        &self,
        store: &S,
        descriptor: &EntityTypeDescriptor,
        entity_id: Option<EntityId>,
        proposed: &FieldMap,
    ) -> Result<PreparedWrite, ApplyError>
    where
        S: EntityStore + ?Sized,
    {
        let mut prepared = PreparedWrite::default();

        for (name, value) in proposed {
            let Some(field) = descriptor.field(name) else {
                tracing::debug!(field = %name, "skipping unknown field");
                prepared.skipped.push(name.clone());
                continue;
            };
            if !field.editable || !field.kind.is_staged() {
                tracing::debug!(field = %name, "skipping non-editable or unstaged field");
                prepared.skipped.push(name.clone());
                continue;
            }
            if value.is_null() && !field.accepts_null() {
                tracing::debug!(field = %name, "skipping null for required field");
                prepared.skipped.push(name.clone());
                continue;
            }

            match &field.kind {
                FieldKind::Scalar => {
                    let value = if field.unique {
                        self.unique_value(store, descriptor, field, entity_id, value)?
                    } else {
                        value.clone()
                    };
                    prepared.columns.insert(name.clone(), value);
                }
                FieldKind::Relation { target } => {
                    let value = self.resolve_relation(store, field, target, value)?;
                    prepared.columns.insert(name.clone(), value);
                }
                FieldKind::FileReference => {
                    let value = self.wrap_file(field, value)?;
                    prepared.columns.insert(name.clone(), value);
                }
                FieldKind::TagList => {
                    prepared.tags = Some(match value {
                        FieldValue::Null => Vec::new(),
                        FieldValue::Text(raw) => parse_tags(raw),
                        other => return Err(invalid(field, "tags", other)),
                    });
                }
                FieldKind::ManyRelation { .. } => {
                    prepared.skipped.push(name.clone());
                    continue;
                }
            }
            prepared.written.push(name.clone());
        }

        Ok(prepared)
    }

    fn unique_value<S>(
        &self,
        store: &S,
        descriptor: &EntityTypeDescriptor,
        field: &FieldDescriptor,
        entity_id: Option<EntityId>,
        value: &FieldValue,
    ) -> Result<FieldValue, ApplyError>
    where
        S: EntityStore + ?Sized,
    {
        let FieldValue::Text(text) = value else {
            return Ok(value.clone());
        };
        let free = disambiguate_slug(
            &field.name,
            text,
            self.options.slug_max_length,
            self.options.slug_max_attempts,
            &mut rand::thread_rng(),
            |candidate| {
                store.exists_with_field_value(
                    &descriptor.name,
                    &field.name,
                    &FieldValue::text(candidate),
                    entity_id,
                )
            },
        )?;
        if free != *text {
            tracing::info!(field = %field.name, from = %text, to = %free, "disambiguated unique value");
        }
        Ok(FieldValue::Text(free))
    }

    fn resolve_relation<S>(
        &self,
        store: &S,
        field: &FieldDescriptor,
        target: &str,
        value: &FieldValue,
    ) -> Result<FieldValue, ApplyError>
    where
        S: EntityStore + ?Sized,
    {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        let id = value
            .as_entity_id()
            .ok_or_else(|| invalid(field, "an entity id", value))?;
        if store.get(target, id, Visibility::All)?.is_none() {
            return Err(ApplyError::Conflict(format!(
                "{} references missing {} #{}",
                field.name, target, id
            )));
        }
        Ok(FieldValue::Ref(EntityRef {
            entity_type: target.to_string(),
            id,
        }))
    }

    fn wrap_file(&self, field: &FieldDescriptor, value: &FieldValue) -> Result<FieldValue, ApplyError> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::File(file) => Ok(FieldValue::File(file.clone())),
            FieldValue::Text(name) => Ok(FieldValue::File(FileRef {
                name: name.clone(),
                path: self.options.media_root.join(name),
            })),
            other => Err(invalid(field, "a file name", other)),
        }
    }
}

fn invalid(field: &FieldDescriptor, expected: &str, got: &FieldValue) -> ApplyError {
    ApplyError::InvalidValue {
        field: field.name.clone(),
        message: format!("expected {}, got {}", expected, got.kind_name()),
    }
}

/// Truncate to at most `max` characters.
fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Find a value for a unique text field that no other record holds.
///
/// The value is first truncated to `max_length`. While `taken` reports a
/// collision, the candidate is cut to `max_length - 2` and a random number in
/// 10..=99 appended. After `max_attempts` collisions this fails.
pub fn disambiguate_slug<R, F>(
    field: &str,
    value: &str,
    max_length: usize,
    max_attempts: usize,
    rng: &mut R,
    mut taken: F,
) -> Result<String, ApplyError>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> Result<bool, EntityStoreError>,
{
    let mut candidate = truncate_chars(value, max_length);
    let mut attempts = 0;

    while taken(&candidate)? {
        if attempts >= max_attempts {
            tracing::warn!(field, attempts, "unique value disambiguation exhausted");
            return Err(ApplyError::SlugExhausted {
                field: field.to_string(),
                attempts,
            });
        }
        attempts += 1;
        let base = truncate_chars(&candidate, max_length.saturating_sub(2));
        let suffix: u8 = rng.gen_range(10..100);
        candidate = truncate_chars(&format!("{}{}", base, suffix), max_length);
    }

    Ok(candidate)
}
