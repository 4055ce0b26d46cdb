// validate.rs — Submission validation.
//
// Runs before the submission pipeline persists anything. Every problem is
// collected so callers can report all of them at once.

use std::fmt;

use mq_changeset::{EntityTypeDescriptor, FieldDescriptor, FieldKind, FieldMap, FieldValue};
use serde::{Deserialize, Serialize};

/// One problem with one submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// The type has no such field.
    UnknownField,
    /// The field cannot be changed through a submission.
    NotEditable,
    /// The value does not fit the field kind.
    KindMismatch { expected: String, got: String },
    /// NULL submitted for a field that requires a value.
    Required,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            IssueKind::UnknownField => write!(f, "{}: unknown field", self.field),
            IssueKind::NotEditable => write!(f, "{}: field is not editable", self.field),
            IssueKind::KindMismatch { expected, got } => {
                write!(f, "{}: expected {}, got {}", self.field, expected, got)
            }
            IssueKind::Required => write!(f, "{}: a value is required", self.field),
        }
    }
}

/// Check a submitted field map against its type.
pub fn validate_fields(
    descriptor: &EntityTypeDescriptor,
    fields: &FieldMap,
) -> Result<(), Vec<FieldIssue>> {
    let issues: Vec<FieldIssue> = fields
        .iter()
        .filter_map(|(name, value)| {
            let problem = match descriptor.field(name) {
                None => Some(IssueKind::UnknownField),
                Some(field) => check_field(field, value),
            }?;
            Some(FieldIssue {
                field: name.clone(),
                problem,
            })
        })
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_field(field: &FieldDescriptor, value: &FieldValue) -> Option<IssueKind> {
    if !field.editable {
        return Some(IssueKind::NotEditable);
    }
    if value.is_null() {
        return (!field.accepts_null()).then_some(IssueKind::Required);
    }

    let (fits, expected) = match &field.kind {
        FieldKind::Scalar => (
            matches!(
                value,
                FieldValue::Bool(_) | FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Text(_)
            ),
            "a scalar",
        ),
        FieldKind::Relation { .. } => (value.as_entity_id().is_some(), "an entity id"),
        FieldKind::FileReference => (
            matches!(value, FieldValue::Text(_) | FieldValue::File(_)),
            "a file name",
        ),
        FieldKind::TagList => (matches!(value, FieldValue::Text(_)), "a tag string"),
        FieldKind::ManyRelation { .. } => (matches!(value, FieldValue::IdList(_)), "an id list"),
    };

    (!fits).then(|| IssueKind::KindMismatch {
        expected: expected.to_string(),
        got: value.kind_name().to_string(),
    })
}
