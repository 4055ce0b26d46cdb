//! # mq-changeset
//!
//! The staged-proposal data model for the moderation queue.
//!
//! A [`Changeset`] is a reviewable proposal to create or modify one entity of
//! a registered type. Proposals carry raw field values (foreign ids, file
//! names), never live references, because the referenced entity may itself
//! still be awaiting review.
//!
//! ## Key components
//!
//! - [`FieldValue`] / [`FieldMap`] — values as proposed and as stored
//! - [`EntityTypeDescriptor`] — ordered field metadata for one type
//! - [`compute_full_diff`] — per-field old/new/changed view for reviewers
//! - [`Changeset`] and [`ModerationStatus`] — the proposal and its lifecycle
//! - [`ChangesetStore`] — persistence seam, with in-memory and JSON backends

pub mod changeset;
pub mod diff;
pub mod error;
pub mod schema;
pub mod store;
pub mod value;

pub use changeset::{Changeset, ChangesetDraft, ChangesetId, ModerationStatus};
pub use diff::{changed_count, changed_fields, compute_full_diff, DiffEntry};
pub use error::ChangeSetError;
pub use schema::{EntityTypeDescriptor, FieldDescriptor, FieldKind};
pub use store::{ChangesetStore, JsonChangesetStore, MemoryChangesetStore};
pub use value::{EntityId, EntityRef, FieldMap, FieldValue, FileRef};
