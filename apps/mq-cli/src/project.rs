// project.rs — The `.mq/` project directory and how the CLI opens it.
//
// Layout under the project root:
//   .mq/types.toml        entity type schema ([[types]] tables)
//   .mq/moderation.toml   ModerationConfig (optional)
//   .mq/changesets/       one JSON file per changeset
//   .mq/entities.json     snapshot of the entity store
//   .mq/events.jsonl      moderation event log

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mq_changeset::{EntityTypeDescriptor, JsonChangesetStore};
use mq_moderation::{EventDispatcher, LogSink, ModerationConfig, ModerationService};
use mq_registry::{EntityRegistry, MemoryEntityStore};
use serde::Deserialize;

pub type CliService = ModerationService<JsonChangesetStore, MemoryEntityStore>;

/// Paths of everything the CLI reads and writes.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub types_file: PathBuf,
    pub config_file: PathBuf,
    pub changesets_dir: PathBuf,
    pub entities_file: PathBuf,
    pub events_log: PathBuf,
}

impl ProjectLayout {
    /// Standard `.mq/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let mq_dir = project_root.as_ref().join(".mq");
        Self {
            types_file: mq_dir.join("types.toml"),
            config_file: mq_dir.join("moderation.toml"),
            changesets_dir: mq_dir.join("changesets"),
            entities_file: mq_dir.join("entities.json"),
            events_log: mq_dir.join("events.jsonl"),
        }
    }

    /// Open the stores and build the service.
    pub fn open(&self) -> anyhow::Result<CliService> {
        let registry = Arc::new(load_registry(&self.types_file)?);
        let config = ModerationConfig::load_or_default(&self.config_file).map_err(|e| {
            anyhow::anyhow!("failed to read {}: {}", self.config_file.display(), e)
        })?;
        let changesets = JsonChangesetStore::new(&self.changesets_dir)?;
        let entities = MemoryEntityStore::load_snapshot(&self.entities_file, registry.clone())
            .with_context(|| format!("failed to load {}", self.entities_file.display()))?;

        let mut events = EventDispatcher::new();
        events.add_sink(Box::new(LogSink::new(&self.events_log)));

        tracing::debug!(types = %self.types_file.display(), "opened moderation project");
        Ok(ModerationService::new(registry, changesets, entities, config).with_events(events))
    }

    /// Persist the entity store. Changesets are written as they change.
    pub fn save(&self, service: CliService) -> anyhow::Result<()> {
        let (_, entities) = service.into_parts();
        entities
            .save_snapshot(&self.entities_file)
            .with_context(|| format!("failed to write {}", self.entities_file.display()))
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    types: Vec<EntityTypeDescriptor>,
}

/// Build the registry from a `types.toml` schema file.
pub fn load_registry(path: &Path) -> anyhow::Result<EntityRegistry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read type schema {}", path.display()))?;
    let schema: SchemaFile = toml::from_str(&content)
        .with_context(|| format!("invalid type schema {}", path.display()))?;
    let registry = EntityRegistry::builder()
        .register_all(schema.types)?
        .build()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_changeset::FieldKind;
    use tempfile::tempdir;

    const SCHEMA: &str = r#"
[[types]]
name = "author"

[[types.fields]]
name = "name"
kind = { type = "scalar" }

[[types]]
name = "book"

[[types.fields]]
name = "title"
kind = { type = "scalar" }

[[types.fields]]
name = "slug"
kind = { type = "scalar" }
unique = true

[[types.fields]]
name = "author"
kind = { type = "relation", target = "author" }

[[types.fields]]
name = "pages"
kind = { type = "scalar" }
editable = false
default = { type = "int", value = 0 }
"#;

    #[test]
    fn schema_file_builds_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("types.toml");
        fs::write(&path, SCHEMA).unwrap();

        let registry = load_registry(&path).unwrap();
        let book = registry.descriptor("book").unwrap();
        assert_eq!(book.fields.len(), 4);
        assert!(book.field("slug").unwrap().unique);
        assert!(!book.field("pages").unwrap().editable);
        assert_eq!(
            book.field("author").unwrap().kind,
            FieldKind::Relation {
                target: "author".to_string()
            }
        );
        assert_eq!(registry.referrers("author").len(), 1);
    }

    #[test]
    fn dangling_relation_in_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("types.toml");
        fs::write(
            &path,
            "[[types]]\nname = \"book\"\n\n[[types.fields]]\nname = \"author\"\nkind = { type = \"relation\", target = \"author\" }\n",
        )
        .unwrap();
        assert!(load_registry(&path).is_err());
    }

    #[test]
    fn open_then_save_writes_snapshot() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::for_project(dir.path());
        fs::create_dir_all(layout.types_file.parent().unwrap()).unwrap();
        fs::write(&layout.types_file, SCHEMA).unwrap();

        let service = layout.open().unwrap();
        assert!(layout.changesets_dir.is_dir());
        layout.save(service).unwrap();
        assert!(layout.entities_file.exists());
    }

    #[test]
    fn malformed_config_is_reported() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::for_project(dir.path());
        fs::create_dir_all(layout.types_file.parent().unwrap()).unwrap();
        fs::write(&layout.types_file, SCHEMA).unwrap();
        fs::write(&layout.config_file, "[slug]\nmax_length = \"long\"\n").unwrap();

        let err = layout.open().err().unwrap();
        assert!(err.to_string().contains("moderation.toml"));
    }

    #[test]
    fn missing_schema_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ProjectLayout::for_project(dir.path()).open().is_err());
    }
}
