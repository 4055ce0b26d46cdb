// value.rs — Field values carried by entities and changesets.
//
// A changeset never holds a live object reference: relation fields are stored
// as a bare foreign id and file fields as a bare name. The live record holds
// the resolved forms (`Ref`, `File`). `FieldValue::raw()` maps a live value
// back to its proposal form so the two can be compared.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a moderated entity within its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved reference to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: EntityId,
}

/// A file stored under the media root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Name relative to the media root, as submitted.
    pub name: String,
    /// Full path (media root joined with `name`).
    pub path: PathBuf,
}

/// A single field value.
///
/// Serialized as `{"type": "text", "value": "..."}` so stored changesets stay
/// unambiguous about the kind of each value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Resolved relation (live records only).
    Ref(EntityRef),
    /// Resolved file reference (live records only).
    File(FileRef),
    /// Ids of a multi-value relation.
    IdList(Vec<EntityId>),
}

/// Ordered field name → value mapping.
pub type FieldMap = BTreeMap<String, FieldValue>;

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// The proposal form of this value: references collapse to their id,
    /// files to their name. Everything else is returned as is.
    pub fn raw(&self) -> FieldValue {
        match self {
            FieldValue::Ref(r) => FieldValue::Int(r.id.0 as i64),
            FieldValue::File(f) => FieldValue::Text(f.name.clone()),
            other => other.clone(),
        }
    }

    /// Interpret this value as a foreign id, if it can be one.
    pub fn as_entity_id(&self) -> Option<EntityId> {
        match self {
            FieldValue::Int(i) if *i >= 0 => Some(EntityId(*i as u64)),
            FieldValue::Ref(r) => Some(r.id),
            FieldValue::Text(s) => s.trim().parse::<u64>().ok().map(EntityId),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, used in validation messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Ref(_) => "ref",
            FieldValue::File(_) => "file",
            FieldValue::IdList(_) => "id_list",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "(none)"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Ref(r) => write!(f, "{}#{}", r.entity_type, r.id),
            FieldValue::File(file) => write!(f, "{}", file.path.display()),
            FieldValue::IdList(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "[{}]", ids.join(", "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<EntityId> for FieldValue {
    fn from(value: EntityId) -> Self {
        FieldValue::Int(value.0 as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_collapses_references_and_files() {
        let r = FieldValue::Ref(EntityRef {
            entity_type: "author".to_string(),
            id: EntityId(7),
        });
        assert_eq!(r.raw(), FieldValue::Int(7));

        let file = FieldValue::File(FileRef {
            name: "covers/a.png".to_string(),
            path: PathBuf::from("/srv/media/covers/a.png"),
        });
        assert_eq!(file.raw(), FieldValue::text("covers/a.png"));

        assert_eq!(FieldValue::Int(3).raw(), FieldValue::Int(3));
    }

    #[test]
    fn as_entity_id_accepts_ints_refs_and_numeric_text() {
        assert_eq!(FieldValue::Int(4).as_entity_id(), Some(EntityId(4)));
        assert_eq!(FieldValue::text(" 12 ").as_entity_id(), Some(EntityId(12)));
        assert_eq!(FieldValue::Int(-1).as_entity_id(), None);
        assert_eq!(FieldValue::text("abc").as_entity_id(), None);
        assert_eq!(FieldValue::Null.as_entity_id(), None);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&FieldValue::text("hi")).unwrap();
        assert_eq!(json, r#"{"type":"text","value":"hi"}"#);

        let json = serde_json::to_string(&FieldValue::Null).unwrap();
        assert_eq!(json, r#"{"type":"null"}"#);
    }

    #[test]
    fn display_formats() {
        assert_eq!(FieldValue::Null.to_string(), "(none)");
        assert_eq!(
            FieldValue::IdList(vec![EntityId(1), EntityId(2)]).to_string(),
            "[1, 2]"
        );
    }
}
