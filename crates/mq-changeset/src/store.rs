// store.rs — ChangesetStore trait and its implementations.
//
// The ChangesetStore trait is the persistence seam for changesets. Two
// implementations ship here:
// - MemoryChangesetStore: a BTreeMap, for embedding and tests.
// - JsonChangesetStore: one pretty-printed JSON file per changeset,
//   `<store_dir>/<id>.json`, easy to inspect by hand.
//
// "Pending" queries are plain scans over the unresolved set. That is fine
// while review queues stay small; a large deployment would want an index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::changeset::{Changeset, ChangesetDraft, ChangesetId};
use crate::error::ChangeSetError;
use crate::value::EntityId;

/// Trait for persisting and retrieving changesets.
pub trait ChangesetStore {
    /// Allocate the next id and persist a new changeset.
    fn create(&mut self, draft: ChangesetDraft) -> Result<Changeset, ChangeSetError>;

    /// Get a changeset by id.
    fn get(&self, id: ChangesetId) -> Result<Option<Changeset>, ChangeSetError>;

    /// Overwrite an existing changeset (status transitions).
    fn save(&mut self, changeset: &Changeset) -> Result<(), ChangeSetError>;

    /// Delete a changeset. Returns false if it did not exist.
    fn remove(&mut self, id: ChangesetId) -> Result<bool, ChangeSetError>;

    /// All changesets in id order.
    fn list(&self) -> Result<Vec<Changeset>, ChangeSetError>;

    /// Created or Pending changesets, optionally restricted to one type.
    fn list_unresolved(&self, entity_type: Option<&str>) -> Result<Vec<Changeset>, ChangeSetError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|cs| !cs.is_resolved())
            .filter(|cs| entity_type.map_or(true, |t| cs.entity_type == t))
            .collect())
    }

    /// Every changeset targeting one entity, in id order.
    fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
    ) -> Result<Vec<Changeset>, ChangeSetError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|cs| cs.entity_type == entity_type && cs.entity_id == Some(entity_id))
            .collect())
    }
}

/// In-memory ChangesetStore.
#[derive(Debug, Default)]
pub struct MemoryChangesetStore {
    changesets: BTreeMap<ChangesetId, Changeset>,
    last_id: u64,
}

impl MemoryChangesetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangesetStore for MemoryChangesetStore {
    fn create(&mut self, draft: ChangesetDraft) -> Result<Changeset, ChangeSetError> {
        self.last_id += 1;
        let changeset = draft.into_changeset(ChangesetId(self.last_id));
        self.changesets.insert(changeset.id, changeset.clone());
        Ok(changeset)
    }

    fn get(&self, id: ChangesetId) -> Result<Option<Changeset>, ChangeSetError> {
        Ok(self.changesets.get(&id).cloned())
    }

    fn save(&mut self, changeset: &Changeset) -> Result<(), ChangeSetError> {
        if !self.changesets.contains_key(&changeset.id) {
            return Err(ChangeSetError::InvalidData(format!(
                "changeset {} does not exist",
                changeset.id
            )));
        }
        self.changesets.insert(changeset.id, changeset.clone());
        Ok(())
    }

    fn remove(&mut self, id: ChangesetId) -> Result<bool, ChangeSetError> {
        Ok(self.changesets.remove(&id).is_some())
    }

    fn list(&self) -> Result<Vec<Changeset>, ChangeSetError> {
        Ok(self.changesets.values().cloned().collect())
    }
}

/// File-backed ChangesetStore: one JSON file per changeset.
///
/// Ids come from a counter persisted in `<store_dir>/next_id`, so an id is
/// never handed out twice even after the changeset holding it is removed.
pub struct JsonChangesetStore {
    store_dir: PathBuf,
}

impl JsonChangesetStore {
    /// Create a new store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, ChangeSetError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| ChangeSetError::IoError {
            path: store_dir.clone(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    fn counter_file(&self) -> PathBuf {
        self.store_dir.join("next_id")
    }

    /// Take the next id and advance the persisted counter. A directory
    /// without a counter starts one past the highest id on disk.
    fn allocate_id(&self) -> Result<ChangesetId, ChangeSetError> {
        let path = self.counter_file();
        let on_disk = self.stored_ids()?.last().map_or(1, |id| id.0 + 1);
        let counter = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|source| ChangeSetError::IoError { path: path.clone(), source })?;
            raw.trim().parse::<u64>().map_err(|e| {
                ChangeSetError::InvalidData(format!(
                    "corrupt id counter {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            1
        };

        let next = counter.max(on_disk);
        fs::write(&path, (next + 1).to_string())
            .map_err(|source| ChangeSetError::IoError { path, source })?;
        Ok(ChangesetId(next))
    }

    /// Path to the JSON file for a given changeset.
    fn changeset_file(&self, id: ChangesetId) -> PathBuf {
        self.store_dir.join(format!("{}.json", id))
    }

    fn write(&self, changeset: &Changeset) -> Result<(), ChangeSetError> {
        let path = self.changeset_file(changeset.id);
        let json = serde_json::to_string_pretty(changeset)?;
        fs::write(&path, json).map_err(|source| ChangeSetError::IoError { path, source })
    }

    /// Ids present on disk, derived from file names.
    fn stored_ids(&self) -> Result<Vec<ChangesetId>, ChangeSetError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| ChangeSetError::IoError {
            path: self.store_dir.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ChangeSetError::IoError {
                path: self.store_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(id) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse::<ChangesetId>().ok())
                {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ChangesetStore for JsonChangesetStore {
    fn create(&mut self, draft: ChangesetDraft) -> Result<Changeset, ChangeSetError> {
        let id = self.allocate_id()?;
        let changeset = draft.into_changeset(id);
        self.write(&changeset)?;
        Ok(changeset)
    }

    fn get(&self, id: ChangesetId) -> Result<Option<Changeset>, ChangeSetError> {
        let path = self.changeset_file(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| ChangeSetError::IoError { path, source })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&mut self, changeset: &Changeset) -> Result<(), ChangeSetError> {
        if !self.changeset_file(changeset.id).exists() {
            return Err(ChangeSetError::InvalidData(format!(
                "changeset {} does not exist",
                changeset.id
            )));
        }
        self.write(changeset)
    }

    fn remove(&mut self, id: ChangesetId) -> Result<bool, ChangeSetError> {
        let path = self.changeset_file(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| ChangeSetError::IoError { path, source })?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Changeset>, ChangeSetError> {
        let mut changesets = Vec::new();
        for id in self.stored_ids()? {
            match self.get(id) {
                Ok(Some(cs)) => changesets.push(cs),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping unreadable changeset {}: {}", id, e),
            }
        }
        Ok(changesets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ModerationStatus;
    use crate::value::{FieldMap, FieldValue};
    use tempfile::tempdir;

    fn update_draft(entity_type: &str, id: u64) -> ChangesetDraft {
        let mut fields = FieldMap::new();
        fields.insert("title".to_string(), FieldValue::text(format!("t{}", id)));
        ChangesetDraft::update(entity_type, EntityId(id), fields, Some("alice".to_string()))
    }

    fn exercise_store(store: &mut dyn ChangesetStore) {
        let a = store.create(update_draft("article", 1)).unwrap();
        let b = store.create(update_draft("author", 2)).unwrap();
        let c = store
            .create(ChangesetDraft::creation("article", None, FieldMap::new(), None))
            .unwrap();
        assert!(a.id < b.id && b.id < c.id);

        let mut approved = b.clone();
        approved
            .transition(ModerationStatus::Approved, "mod", "")
            .unwrap();
        store.save(&approved).unwrap();

        let unresolved = store.list_unresolved(None).unwrap();
        let ids: Vec<ChangesetId> = unresolved.iter().map(|cs| cs.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);

        let articles = store.list_unresolved(Some("article")).unwrap();
        assert_eq!(articles.len(), 2);
        assert!(store.list_unresolved(Some("author")).unwrap().is_empty());

        let for_entity = store.list_for_entity("article", EntityId(1)).unwrap();
        assert_eq!(for_entity.len(), 1);
        assert_eq!(for_entity[0].id, a.id);

        assert!(store.remove(a.id).unwrap());
        assert!(!store.remove(a.id).unwrap());
        assert!(store.get(a.id).unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn memory_store_behaves() {
        let mut store = MemoryChangesetStore::new();
        exercise_store(&mut store);
    }

    #[test]
    fn json_store_behaves() {
        let dir = tempdir().unwrap();
        let mut store = JsonChangesetStore::new(dir.path().join("changesets")).unwrap();
        exercise_store(&mut store);
    }

    #[test]
    fn save_unknown_changeset_is_rejected() {
        let mut store = MemoryChangesetStore::new();
        let cs = update_draft("article", 1).into_changeset(ChangesetId(99));
        assert!(matches!(
            store.save(&cs),
            Err(ChangeSetError::InvalidData(_))
        ));
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("changesets");

        let id = {
            let mut store = JsonChangesetStore::new(&store_path).unwrap();
            store.create(update_draft("article", 1)).unwrap().id
        };

        let mut store = JsonChangesetStore::new(&store_path).unwrap();
        let found = store.get(id).unwrap().unwrap();
        assert_eq!(found.submitter.as_deref(), Some("alice"));
        assert!(found.verify_hash());

        // Ids keep increasing after reopen.
        let next = store.create(update_draft("article", 2)).unwrap();
        assert!(next.id > id);
    }

    #[test]
    fn json_store_never_reuses_a_removed_id() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("changesets");

        let first = {
            let mut store = JsonChangesetStore::new(&store_path).unwrap();
            let first = store.create(update_draft("article", 1)).unwrap().id;
            assert!(store.remove(first).unwrap());
            first
        };

        let mut store = JsonChangesetStore::new(&store_path).unwrap();
        let second = store.create(update_draft("article", 1)).unwrap().id;
        assert!(second > first);
        assert!(store.get(first).unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_never_reuses_a_removed_id() {
        let mut store = MemoryChangesetStore::new();
        let first = store.create(update_draft("article", 1)).unwrap().id;
        store.remove(first).unwrap();
        let second = store.create(update_draft("article", 1)).unwrap().id;
        assert!(second > first);
    }
}
