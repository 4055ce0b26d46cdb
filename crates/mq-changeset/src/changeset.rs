// changeset.rs — The staged proposal to create or modify one entity.
//
// A Changeset is created by the submission pipeline with its proposed fields
// frozen (a SHA-256 content hash guards them). After that, only the review
// transitions touch it: Created/Pending → Approved/Rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChangeSetError;
use crate::value::{EntityId, FieldMap};

/// Monotonic changeset identifier. Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetId(pub u64);

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChangesetId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ChangesetId)
    }
}

/// Review status of a changeset.
///
///   Created ─┐
///            ├─→ Approved
///   Pending ─┘   Rejected
///
/// Approved and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    /// Proposes a new entity that is not live yet.
    Created,
    /// Proposes an edit to an existing entity.
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn can_transition_to(&self, next: ModerationStatus) -> bool {
        matches!(
            (self, next),
            (ModerationStatus::Created, ModerationStatus::Approved)
                | (ModerationStatus::Created, ModerationStatus::Rejected)
                | (ModerationStatus::Pending, ModerationStatus::Approved)
                | (ModerationStatus::Pending, ModerationStatus::Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ModerationStatus::Approved | ModerationStatus::Rejected)
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationStatus::Created => write!(f, "created"),
            ModerationStatus::Pending => write!(f, "pending"),
            ModerationStatus::Approved => write!(f, "approved"),
            ModerationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(ModerationStatus::Created),
            "pending" => Ok(ModerationStatus::Pending),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            _ => Err(format!(
                "Invalid moderation status: '{}'. Valid statuses: created, pending, approved, rejected",
                s
            )),
        }
    }
}

/// Everything needed to create a changeset except its id.
///
/// Stores turn a draft into a [`Changeset`] once they have allocated an id.
#[derive(Debug, Clone)]
pub struct ChangesetDraft {
    pub entity_type: String,
    pub entity_id: Option<EntityId>,
    pub status: ModerationStatus,
    pub proposed_fields: FieldMap,
    pub submitter: Option<String>,
}

impl ChangesetDraft {
    /// Proposal for a brand new entity (all submitted fields).
    pub fn creation(
        entity_type: impl Into<String>,
        entity_id: Option<EntityId>,
        proposed_fields: FieldMap,
        submitter: Option<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            status: ModerationStatus::Created,
            proposed_fields,
            submitter,
        }
    }

    /// Proposal to edit an existing entity (changed fields only).
    pub fn update(
        entity_type: impl Into<String>,
        entity_id: EntityId,
        proposed_fields: FieldMap,
        submitter: Option<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: Some(entity_id),
            status: ModerationStatus::Pending,
            proposed_fields,
            submitter,
        }
    }

    /// Materialize the changeset with the id allocated by a store.
    pub fn into_changeset(self, id: ChangesetId) -> Changeset {
        let content_hash = compute_content_hash(&self.proposed_fields);
        Changeset {
            id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            created_at: Utc::now(),
            status: self.status,
            proposed_fields: self.proposed_fields,
            reviewer: None,
            reviewed_at: None,
            review_reason: String::new(),
            submitter: self.submitter,
            content_hash,
        }
    }
}

/// A staged, reviewable proposal to create or modify one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ChangesetId,

    /// Name of the registered entity type.
    pub entity_type: String,

    /// Target entity. `None` means the entity has not been created yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,

    pub created_at: DateTime<Utc>,

    pub status: ModerationStatus,

    /// Proposed raw values: foreign ids for relations, names for files.
    pub proposed_fields: FieldMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub review_reason: String,

    /// Who proposed the change. `None` for anonymous submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,

    /// SHA-256 of the serialized proposed fields, fixed at creation.
    pub content_hash: String,
}

impl Changeset {
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a terminal status, recording the review.
    pub fn transition(
        &mut self,
        next: ModerationStatus,
        reviewer: &str,
        reason: &str,
    ) -> Result<(), ChangeSetError> {
        if !self.status.can_transition_to(next) {
            return Err(ChangeSetError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.reviewer = Some(reviewer.to_string());
        self.reviewed_at = Some(Utc::now());
        self.review_reason = reason.to_string();
        Ok(())
    }

    /// Verify the content hash still matches the proposed fields.
    pub fn verify_hash(&self) -> bool {
        self.content_hash == compute_content_hash(&self.proposed_fields)
    }
}

/// Compute SHA-256 hash of the serialized proposed fields.
fn compute_content_hash(fields: &FieldMap) -> String {
    let json = serde_json::to_string(fields).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
