//! # mq-moderation
//!
//! Staging and review of changes to moderated entities.
//!
//! A submission is validated, diffed against the entity's current state, and
//! stored as a [`Changeset`](mq_changeset::Changeset). Nothing reaches the
//! live record until a moderator approves it; approval writes the proposed
//! fields through the [`Applier`](mq_registry::Applier) and flips the entity
//! live.
//!
//! ## Key components
//!
//! - [`ModerationService`] — the facade: submit, approve, reject, queries
//! - [`Submission`] / [`SubmitOutcome`] — the submission pipeline
//! - [`CascadeReport`] — result of resolving a changeset with its dependents
//! - [`ModerationConfig`] — `.mq/moderation.toml`, bypass policy helper
//! - [`ModerationEvent`] / [`EventDispatcher`] — notifications on queue changes
//! - [`ModerationError`] — everything the service can fail with

pub mod config;
pub mod error;
pub mod events;
pub mod review;
pub mod service;
pub mod submission;
pub mod validate;

pub use config::{Actor, ModerationConfig, SlugConfig};
pub use error::{EventError, ModerationError};
pub use events::{EventDispatcher, LogSink, ModerationEvent, NotificationSink};
pub use review::{CascadeFailure, CascadeReport};
pub use service::{ChangesetDiff, EntityModerationStatus, ModerationService, ReviewDetails};
pub use submission::{SubmitOutcome, Submission};
pub use validate::{validate_fields, FieldIssue, IssueKind};
