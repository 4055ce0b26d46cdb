// diff.rs — Field-level diffs between a live entity and a proposal.
//
// `compute_full_diff` produces one entry per descriptor field (for review
// display); `changed_fields` produces the minimal proposal for an edit.
// Both compare raw forms so a live `Ref` equals the bare id proposing it.

use serde::{Deserialize, Serialize};

use crate::schema::EntityTypeDescriptor;
use crate::value::{FieldMap, FieldValue};

/// One row of a full diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub field: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub changed: bool,
}

/// Diff every known field of `descriptor` against a proposal.
///
/// `current` is the live entity's fields, or `None` when the entity does not
/// exist yet (each field's default then stands in as the old value). Keys in
/// `proposed` that the descriptor does not know are ignored.
pub fn compute_full_diff(
    descriptor: &EntityTypeDescriptor,
    current: Option<&FieldMap>,
    proposed: &FieldMap,
) -> Vec<DiffEntry> {
    descriptor
        .fields
        .iter()
        .map(|field| {
            let old_value = current
                .and_then(|fields| fields.get(&field.name))
                .unwrap_or(&field.default)
                .raw();
            let new_value = proposed
                .get(&field.name)
                .map(FieldValue::raw)
                .unwrap_or_else(|| old_value.clone());
            let changed = old_value != new_value;
            DiffEntry {
                field: field.name.clone(),
                old_value,
                new_value,
                changed,
            }
        })
        .collect()
}

/// The subset of `submitted` whose raw value differs from `current`.
///
/// Unknown fields are dropped. A field missing from `current` counts as its
/// descriptor default.
pub fn changed_fields(
    descriptor: &EntityTypeDescriptor,
    current: &FieldMap,
    submitted: &FieldMap,
) -> FieldMap {
    submitted
        .iter()
        .filter_map(|(name, value)| {
            let field = descriptor.field(name)?;
            let old = current.get(name).unwrap_or(&field.default).raw();
            let new = value.raw();
            (old != new).then(|| (name.clone(), new))
        })
        .collect()
}

/// Count of changed rows in a full diff.
pub fn changed_count(diff: &[DiffEntry]) -> usize {
    diff.iter().filter(|entry| entry.changed).count()
}
