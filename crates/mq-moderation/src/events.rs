// events.rs — Moderation events and notification dispatch.
//
// The service emits an event whenever the queue changes: a changeset is
// created, approved, rejected, or invalidated, or a bypassed submission is
// applied directly. Sinks (a JSONL log, a webhook bridge, a mailer) subscribe
// through the dispatcher. Dispatch is synchronous and sink failures never
// abort the operation that raised the event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mq_changeset::{Changeset, ChangesetId, EntityId, ModerationStatus};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Events emitted by the moderation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ModerationEvent {
    /// A submission was staged for review.
    ChangesetCreated {
        changeset_id: ChangesetId,
        entity_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_id: Option<EntityId>,
        status: ModerationStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        submitter: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A changeset was approved and applied.
    ChangesetApproved {
        changeset_id: ChangesetId,
        entity_type: String,
        entity_id: EntityId,
        reviewer: String,
        timestamp: DateTime<Utc>,
    },

    /// A changeset was rejected.
    ChangesetRejected {
        changeset_id: ChangesetId,
        entity_type: String,
        reviewer: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A changeset was found to target nothing and was deleted.
    ChangesetInvalidated {
        changeset_id: ChangesetId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A bypassed submission was written straight to the entity.
    SubmissionApplied {
        entity_type: String,
        entity_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        submitter: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ModerationEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            ModerationEvent::ChangesetCreated { .. } => "changeset_created",
            ModerationEvent::ChangesetApproved { .. } => "changeset_approved",
            ModerationEvent::ChangesetRejected { .. } => "changeset_rejected",
            ModerationEvent::ChangesetInvalidated { .. } => "changeset_invalidated",
            ModerationEvent::SubmissionApplied { .. } => "submission_applied",
        }
    }

    pub fn changeset_created(changeset: &Changeset) -> Self {
        ModerationEvent::ChangesetCreated {
            changeset_id: changeset.id,
            entity_type: changeset.entity_type.clone(),
            entity_id: changeset.entity_id,
            status: changeset.status,
            submitter: changeset.submitter.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn changeset_approved(changeset: &Changeset, entity_id: EntityId) -> Self {
        ModerationEvent::ChangesetApproved {
            changeset_id: changeset.id,
            entity_type: changeset.entity_type.clone(),
            entity_id,
            reviewer: changeset.reviewer.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }

    pub fn changeset_rejected(changeset: &Changeset) -> Self {
        ModerationEvent::ChangesetRejected {
            changeset_id: changeset.id,
            entity_type: changeset.entity_type.clone(),
            reviewer: changeset.reviewer.clone().unwrap_or_default(),
            reason: changeset.review_reason.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving moderation events.
pub trait NotificationSink: Send {
    /// Handle an event. Errors are logged but don't stop the system.
    fn send(&self, event: &ModerationEvent) -> Result<(), EventError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &ModerationEvent) -> Result<(), EventError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| EventError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventError::IoError {
                path: self.path.clone(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| EventError::IoError {
            path: self.path.clone(),
            source,
        })
    }
}

/// Dispatches events to every registered sink.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Send an event to all sinks. A failing sink does not stop the others.
    pub fn dispatch(&self, event: &ModerationEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event = event.event_type(), "notification sink error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_changeset::{ChangesetDraft, FieldMap};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn sample() -> Changeset {
        ChangesetDraft::update("article", EntityId(5), FieldMap::new(), Some("sam".to_string()))
            .into_changeset(ChangesetId(3))
    }

    /// Records events in memory.
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl NotificationSink for Recorder {
        fn send(&self, event: &ModerationEvent) -> Result<(), EventError> {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(event.event_type().to_string());
            }
            Ok(())
        }
    }

    struct Failing;

    impl NotificationSink for Failing {
        fn send(&self, _event: &ModerationEvent) -> Result<(), EventError> {
            Err(EventError::IoError {
                path: PathBuf::from("/dev/full"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = ModerationEvent::changeset_created(&sample());
        let json = serde_json::to_string(&event).unwrap();
        let restored: ModerationEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.event_type(), "changeset_created");
        assert!(json.contains("\"changeset_created\""));
        assert!(json.contains("\"pending\""));
    }

    #[test]
    fn log_sink_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let sink = LogSink::new(&path);

        sink.send(&ModerationEvent::changeset_created(&sample())).unwrap();
        sink.send(&ModerationEvent::changeset_rejected(&sample())).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("changeset_rejected"));
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(Failing));
        dispatcher.add_sink(Box::new(Recorder(seen.clone())));

        dispatcher.dispatch(&ModerationEvent::changeset_approved(&sample(), EntityId(5)));

        assert_eq!(*seen.lock().unwrap(), vec!["changeset_approved"]);
    }
}
