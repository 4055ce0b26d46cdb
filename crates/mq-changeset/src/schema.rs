// schema.rs — Entity-type descriptors.
//
// A descriptor names a moderatable type and lists its fields in display
// order. Each field carries a `FieldKind` that decides how a proposed value is
// validated and applied. Descriptors are plain data: they are built once at
// startup (in code or from a schema file) and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// How a field's proposed value is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain column value.
    Scalar,
    /// Foreign key to another moderated type. Proposals carry the bare id.
    Relation { target: String },
    /// File stored under the media root. Proposals carry the file name.
    FileReference,
    /// Delimited tag string handed to the tagging subsystem.
    TagList,
    /// Multi-value relation. Written directly at submission, never staged.
    ManyRelation { target: String },
}

impl FieldKind {
    /// Whether values of this kind go through a changeset at all.
    pub fn is_staged(&self) -> bool {
        !matches!(self, FieldKind::ManyRelation { .. })
    }

    pub fn relation_target(&self) -> Option<&str> {
        match self {
            FieldKind::Relation { target } => Some(target),
            _ => None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Metadata for a single field of a moderated type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// The column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// The field may be left empty on submission.
    #[serde(default)]
    pub optional: bool,
    /// Non-editable fields are never written by a changeset.
    #[serde(default = "default_true")]
    pub editable: bool,
    /// Values must be unique among records of the type (slug semantics).
    #[serde(default)]
    pub unique: bool,
    /// Zero value shown as the "old" side when the entity does not exist yet.
    #[serde(default = "default_null")]
    pub default: FieldValue,
}

fn default_null() -> FieldValue {
    FieldValue::Null
}

impl FieldDescriptor {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            optional: false,
            editable: true,
            unique: false,
            default: FieldValue::Null,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Scalar)
    }

    /// A unique short text field. Colliding values are disambiguated on apply.
    pub fn slug(name: impl Into<String>) -> Self {
        let mut field = Self::with_kind(name, FieldKind::Scalar);
        field.unique = true;
        field
    }

    pub fn relation(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::Relation {
                target: target.into(),
            },
        )
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::FileReference)
    }

    pub fn tags(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::TagList)
    }

    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::ManyRelation {
                target: target.into(),
            },
        )
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.default = value;
        self
    }

    /// A NULL may only be written when the field is both nullable and optional.
    pub fn accepts_null(&self) -> bool {
        self.nullable && self.optional
    }
}

/// Describes one moderatable entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl EntityTypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field (builder pattern).
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Relation fields of this type that point at `target`.
    pub fn relations_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |f| f.kind.relation_target() == Some(target))
    }
}
