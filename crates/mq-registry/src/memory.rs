// memory.rs — In-memory EntityStore + TagStore with constraint checks.
//
// MemoryEntityStore keeps one table per registered type and enforces the
// same constraints a relational backend would: unique columns and foreign
// keys (resolved `Ref` values must point at an existing record). That makes
// it a faithful stand-in for tests and for the CLI, which snapshots the whole
// store to a JSON file between invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use mq_changeset::{EntityId, FieldKind, FieldMap, FieldValue};
use serde::{Deserialize, Serialize};

use crate::backend::{EntityRecord, EntityStore, TagStore, Visibility};
use crate::error::EntityStoreError;
use crate::registry::EntityRegistry;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    records: BTreeMap<String, BTreeMap<EntityId, EntityRecord>>,
    #[serde(default)]
    tags: BTreeMap<String, BTreeMap<EntityId, Vec<String>>>,
    #[serde(default)]
    last_ids: BTreeMap<String, u64>,
}

/// In-memory entity backend.
#[derive(Debug, Clone)]
pub struct MemoryEntityStore {
    registry: Arc<EntityRegistry>,
    tables: Tables,
}

impl MemoryEntityStore {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            tables: Tables::default(),
        }
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot).
    /// A missing file yields an empty store.
    pub fn load_snapshot(
        path: impl AsRef<Path>,
        registry: Arc<EntityRegistry>,
    ) -> Result<Self, EntityStoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new(registry));
        }
        let json = fs::read_to_string(path).map_err(|source| EntityStoreError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let tables = serde_json::from_str(&json)?;
        Ok(Self { registry, tables })
    }

    /// Write the whole store to a JSON file.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), EntityStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| EntityStoreError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.tables)?;
        fs::write(path, json).map_err(|source| EntityStoreError::IoError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert a record directly, bypassing moderation. Seeds fixtures.
    pub fn insert_live(
        &mut self,
        entity_type: &str,
        fields: FieldMap,
    ) -> Result<EntityId, EntityStoreError> {
        let id = self.create_partial(entity_type, &fields)?;
        self.set_live(entity_type, id, true)?;
        Ok(id)
    }

    /// Delete a record, as an external actor might.
    pub fn delete(&mut self, entity_type: &str, id: EntityId) -> bool {
        if let Some(tags) = self.tables.tags.get_mut(entity_type) {
            tags.remove(&id);
        }
        self.tables
            .records
            .get_mut(entity_type)
            .is_some_and(|table| table.remove(&id).is_some())
    }

    fn conflict(entity_type: &str, message: String) -> EntityStoreError {
        EntityStoreError::Conflict {
            entity_type: entity_type.to_string(),
            message,
        }
    }

    fn record_mut(
        &mut self,
        entity_type: &str,
        id: EntityId,
    ) -> Result<&mut EntityRecord, EntityStoreError> {
        self.tables
            .records
            .get_mut(entity_type)
            .and_then(|table| table.get_mut(&id))
            .ok_or_else(|| EntityStoreError::NotFound {
                entity_type: entity_type.to_string(),
                id,
            })
    }

    fn exists(&self, entity_type: &str, id: EntityId) -> bool {
        self.tables
            .records
            .get(entity_type)
            .is_some_and(|table| table.contains_key(&id))
    }

    /// Enforce column, unique, and foreign-key constraints for a write.
    fn check_columns(
        &self,
        entity_type: &str,
        id: Option<EntityId>,
        fields: &FieldMap,
    ) -> Result<(), EntityStoreError> {
        let descriptor = self.registry.descriptor(entity_type)?;
        for (name, value) in fields {
            let field = descriptor.field(name).ok_or_else(|| {
                Self::conflict(entity_type, format!("unknown column '{}'", name))
            })?;
            match &field.kind {
                FieldKind::TagList | FieldKind::ManyRelation { .. } => {
                    return Err(Self::conflict(
                        entity_type,
                        format!("'{}' is not a column", name),
                    ));
                }
                FieldKind::Relation { target } => match value {
                    FieldValue::Null => {}
                    FieldValue::Ref(r) if r.entity_type == *target => {
                        if !self.exists(target, r.id) {
                            return Err(Self::conflict(
                                entity_type,
                                format!("foreign key {} -> {} #{} is dangling", name, target, r.id),
                            ));
                        }
                    }
                    other => {
                        return Err(Self::conflict(
                            entity_type,
                            format!("{} expects a {} reference, got {}", name, target, other.kind_name()),
                        ));
                    }
                },
                FieldKind::Scalar | FieldKind::FileReference => {}
            }
            if field.unique
                && !value.is_null()
                && self.exists_with_field_value(entity_type, name, value, id)?
            {
                return Err(Self::conflict(
                    entity_type,
                    format!("duplicate value '{}' for unique column {}", value, name),
                ));
            }
        }
        Ok(())
    }
}

impl EntityStore for MemoryEntityStore {
    fn get(
        &self,
        entity_type: &str,
        id: EntityId,
        visibility: Visibility,
    ) -> Result<Option<EntityRecord>, EntityStoreError> {
        self.registry.descriptor(entity_type)?;
        Ok(self
            .tables
            .records
            .get(entity_type)
            .and_then(|table| table.get(&id))
            .filter(|record| record.is_visible(visibility))
            .cloned())
    }

    fn list(
        &self,
        entity_type: &str,
        visibility: Visibility,
    ) -> Result<Vec<EntityRecord>, EntityStoreError> {
        self.registry.descriptor(entity_type)?;
        Ok(self
            .tables
            .records
            .get(entity_type)
            .map(|table| {
                table
                    .values()
                    .filter(|record| record.is_visible(visibility))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create_partial(
        &mut self,
        entity_type: &str,
        fields: &FieldMap,
    ) -> Result<EntityId, EntityStoreError> {
        self.check_columns(entity_type, None, fields)?;
        let last = self
            .tables
            .last_ids
            .entry(entity_type.to_string())
            .or_insert(0);
        *last += 1;
        let id = EntityId(*last);
        self.tables
            .records
            .entry(entity_type.to_string())
            .or_default()
            .insert(
                id,
                EntityRecord {
                    id,
                    is_live: false,
                    fields: fields.clone(),
                },
            );
        Ok(id)
    }

    fn update_partial(
        &mut self,
        entity_type: &str,
        id: EntityId,
        fields: &FieldMap,
    ) -> Result<(), EntityStoreError> {
        self.check_columns(entity_type, Some(id), fields)?;
        let record = self.record_mut(entity_type, id)?;
        for (name, value) in fields {
            record.fields.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn exists_with_field_value(
        &self,
        entity_type: &str,
        field: &str,
        value: &FieldValue,
        excluding: Option<EntityId>,
    ) -> Result<bool, EntityStoreError> {
        let needle = value.raw();
        Ok(self
            .tables
            .records
            .get(entity_type)
            .is_some_and(|table| {
                table.values().any(|record| {
                    Some(record.id) != excluding
                        && record.fields.get(field).map(FieldValue::raw).as_ref() == Some(&needle)
                })
            }))
    }

    fn set_live(
        &mut self,
        entity_type: &str,
        id: EntityId,
        live: bool,
    ) -> Result<(), EntityStoreError> {
        self.record_mut(entity_type, id)?.is_live = live;
        Ok(())
    }

    fn set_related(
        &mut self,
        entity_type: &str,
        id: EntityId,
        field: &str,
        ids: &[EntityId],
    ) -> Result<(), EntityStoreError> {
        let descriptor = self.registry.descriptor(entity_type)?;
        let Some(FieldKind::ManyRelation { target }) = descriptor.field(field).map(|f| &f.kind)
        else {
            return Err(Self::conflict(
                entity_type,
                format!("'{}' is not a multi-value relation", field),
            ));
        };
        if let Some(missing) = ids.iter().find(|related| !self.exists(target, **related)) {
            return Err(Self::conflict(
                entity_type,
                format!("{} references missing {} #{}", field, target, missing),
            ));
        }
        let value = FieldValue::IdList(ids.to_vec());
        self.record_mut(entity_type, id)?
            .fields
            .insert(field.to_string(), value);
        Ok(())
    }
}

impl TagStore for MemoryEntityStore {
    fn set_tags(
        &mut self,
        entity_type: &str,
        id: EntityId,
        tags: &[String],
    ) -> Result<(), EntityStoreError> {
        if !self.exists(entity_type, id) {
            return Err(EntityStoreError::NotFound {
                entity_type: entity_type.to_string(),
                id,
            });
        }
        self.tables
            .tags
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, tags.to_vec());
        Ok(())
    }

    fn tags(&self, entity_type: &str, id: EntityId) -> Result<Vec<String>, EntityStoreError> {
        Ok(self
            .tables
            .tags
            .get(entity_type)
            .and_then(|table| table.get(&id))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_changeset::{EntityRef, EntityTypeDescriptor, FieldDescriptor};
    use tempfile::tempdir;

    fn registry() -> Arc<EntityRegistry> {
        Arc::new(
            EntityRegistry::builder()
                .register(
                    EntityTypeDescriptor::new("team")
                        .with_field(FieldDescriptor::scalar("name"))
                        .with_field(FieldDescriptor::slug("slug")),
                )
                .unwrap()
                .register(
                    EntityTypeDescriptor::new("player")
                        .with_field(FieldDescriptor::scalar("name"))
                        .with_field(FieldDescriptor::relation("team", "team"))
                        .with_field(FieldDescriptor::many("rivals", "player")),
                )
                .unwrap()
                .build()
                .unwrap(),
        )
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn created_records_are_hidden_until_live() {
        let mut store = MemoryEntityStore::new(registry());
        let id = store
            .create_partial("team", &fields(&[("name", FieldValue::text("Owls"))]))
            .unwrap();

        assert!(store.get("team", id, Visibility::Live).unwrap().is_none());
        assert!(store.get("team", id, Visibility::All).unwrap().is_some());
        assert!(store.list("team", Visibility::Live).unwrap().is_empty());

        store.set_live("team", id, true).unwrap();
        assert!(store.get("team", id, Visibility::Live).unwrap().is_some());
        assert_eq!(store.list("team", Visibility::Live).unwrap().len(), 1);
    }

    #[test]
    fn unique_columns_are_enforced() {
        let mut store = MemoryEntityStore::new(registry());
        let first = store
            .insert_live("team", fields(&[("slug", FieldValue::text("owls"))]))
            .unwrap();
        let second = store
            .insert_live("team", fields(&[("slug", FieldValue::text("hawks"))]))
            .unwrap();

        let dup = store.update_partial("team", second, &fields(&[("slug", FieldValue::text("owls"))]));
        assert!(matches!(dup, Err(EntityStoreError::Conflict { .. })));

        // Rewriting its own value is fine.
        store
            .update_partial("team", first, &fields(&[("slug", FieldValue::text("owls"))]))
            .unwrap();
        assert!(store
            .exists_with_field_value("team", "slug", &FieldValue::text("owls"), Some(second))
            .unwrap());
        assert!(!store
            .exists_with_field_value("team", "slug", &FieldValue::text("owls"), Some(first))
            .unwrap());
    }

    #[test]
    fn foreign_keys_must_resolve() {
        let mut store = MemoryEntityStore::new(registry());
        let dangling = store.create_partial(
            "player",
            &fields(&[(
                "team",
                FieldValue::Ref(EntityRef {
                    entity_type: "team".to_string(),
                    id: EntityId(42),
                }),
            )]),
        );
        assert!(matches!(dangling, Err(EntityStoreError::Conflict { .. })));

        let bare_id = store.create_partial("player", &fields(&[("team", FieldValue::Int(1))]));
        assert!(matches!(bare_id, Err(EntityStoreError::Conflict { .. })));
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let mut store = MemoryEntityStore::new(registry());
        let id = store
            .insert_live(
                "team",
                fields(&[("name", FieldValue::text("Owls")), ("slug", FieldValue::text("owls"))]),
            )
            .unwrap();
        store
            .update_partial("team", id, &fields(&[("name", FieldValue::text("Night Owls"))]))
            .unwrap();
        let record = store.get("team", id, Visibility::All).unwrap().unwrap();
        assert_eq!(record.fields["name"], FieldValue::text("Night Owls"));
        assert_eq!(record.fields["slug"], FieldValue::text("owls"));
    }

    #[test]
    fn set_related_checks_targets() {
        let mut store = MemoryEntityStore::new(registry());
        let a = store.insert_live("player", FieldMap::new()).unwrap();
        let b = store.insert_live("player", FieldMap::new()).unwrap();

        store.set_related("player", a, "rivals", &[b]).unwrap();
        let record = store.get("player", a, Visibility::All).unwrap().unwrap();
        assert_eq!(record.fields["rivals"], FieldValue::IdList(vec![b]));

        let missing = store.set_related("player", a, "rivals", &[EntityId(99)]);
        assert!(matches!(missing, Err(EntityStoreError::Conflict { .. })));
        let wrong_field = store.set_related("player", a, "name", &[b]);
        assert!(matches!(wrong_field, Err(EntityStoreError::Conflict { .. })));
    }

    #[test]
    fn tags_require_existing_entity() {
        let mut store = MemoryEntityStore::new(registry());
        let id = store.insert_live("team", FieldMap::new()).unwrap();
        store
            .set_tags("team", id, &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(store.tags("team", id).unwrap(), vec!["a", "b"]);
        assert!(store.set_tags("team", EntityId(99), &[]).is_err());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.json");

        let mut store = MemoryEntityStore::new(registry());
        let id = store
            .insert_live("team", fields(&[("name", FieldValue::text("Owls"))]))
            .unwrap();
        store.set_tags("team", id, &["night".to_string()]).unwrap();
        store.save_snapshot(&path).unwrap();

        let mut reopened = MemoryEntityStore::load_snapshot(&path, registry()).unwrap();
        let record = reopened.get("team", id, Visibility::Live).unwrap().unwrap();
        assert_eq!(record.fields["name"], FieldValue::text("Owls"));
        assert_eq!(reopened.tags("team", id).unwrap(), vec!["night"]);

        // Id allocation continues after reload.
        let next = reopened.create_partial("team", &FieldMap::new()).unwrap();
        assert!(next > id);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let store = MemoryEntityStore::new(registry());
        assert!(matches!(
            store.get("film", EntityId(1), Visibility::All),
            Err(EntityStoreError::Registry(_))
        ));
    }
}
