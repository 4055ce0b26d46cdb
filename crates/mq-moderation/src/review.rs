// review.rs — Approve, reject, and the dependent-changeset cascade.
//
// Status only moves Created|Pending → Approved|Rejected, and only after the
// entity side of an approval has succeeded. An approval whose target is gone
// deletes the changeset instead.
//
// Dependents are found by scanning the unresolved set for changesets whose
// proposed fields, or whose own target entity, point at this changeset's
// entity through a relation field. The scan is linear in the queue size.

use std::collections::BTreeSet;
use std::sync::Arc;

use mq_changeset::{Changeset, ChangesetId, ChangesetStore, EntityId, ModerationStatus};
use mq_registry::{Applier, EntityStore, TagStore, Visibility};

use crate::error::ModerationError;
use crate::events::ModerationEvent;
use crate::service::ModerationService;

/// A dependent that could not be resolved during a cascade.
#[derive(Debug)]
pub struct CascadeFailure {
    pub changeset_id: ChangesetId,
    pub error: ModerationError,
}

/// Outcome of approving or rejecting a changeset together with its dependents.
#[derive(Debug)]
pub struct CascadeReport {
    pub parent: Changeset,
    /// Dependents resolved successfully, in the order they were processed.
    pub resolved: Vec<Changeset>,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<C, E> ModerationService<C, E>
where
    C: ChangesetStore,
    E: EntityStore + TagStore,
{
    /// Apply a changeset to its entity and mark it approved.
    pub fn approve(
        &mut self,
        id: ChangesetId,
        reviewer: &str,
        reason: &str,
    ) -> Result<Changeset, ModerationError> {
        let mut changeset = self.get_changeset(id)?;
        if changeset.is_resolved() {
            return Err(ModerationError::InvalidTransition {
                id,
                from: changeset.status.to_string(),
                to: ModerationStatus::Approved.to_string(),
            });
        }
        if !changeset.verify_hash() {
            tracing::warn!(changeset_id = %id, "proposed fields do not match content hash");
            return Err(ModerationError::TamperedChangeset(id));
        }

        let registry = Arc::clone(&self.registry);
        registry.descriptor(&changeset.entity_type)?;

        let target = match (changeset.status, changeset.entity_id) {
            (ModerationStatus::Pending, None) => {
                return Err(self.invalidate(&changeset, "no target entity id".to_string())?);
            }
            (_, Some(entity_id))
                if self
                    .entities
                    .get(&changeset.entity_type, entity_id, Visibility::All)?
                    .is_none() =>
            {
                let reason = format!("{} #{} no longer exists", changeset.entity_type, entity_id);
                return Err(self.invalidate(&changeset, reason)?);
            }
            (_, target) => target,
        };

        let options = self.config.apply_options();
        let applied = Applier::new(&registry, &options)
            .apply(
                &mut self.entities,
                &changeset.entity_type,
                target,
                &changeset.proposed_fields,
            )
            .map_err(|e| {
                tracing::warn!(changeset_id = %id, error = %e, "approval failed to apply");
                ModerationError::from_apply(Some(id), e)
            })?;
        self.entities
            .set_live(&changeset.entity_type, applied.entity_id, true)?;

        changeset.entity_id = Some(applied.entity_id);
        changeset.transition(ModerationStatus::Approved, reviewer, reason)?;
        self.changesets.save(&changeset)?;

        tracing::info!(
            changeset_id = %id,
            entity_type = %changeset.entity_type,
            entity_id = %applied.entity_id,
            reviewer,
            "approved changeset"
        );
        self.emit(ModerationEvent::changeset_approved(&changeset, applied.entity_id));
        Ok(changeset)
    }

    /// Mark a changeset rejected. The entity is not touched.
    ///
    /// Rejecting an already rejected changeset returns it unchanged.
    pub fn reject(
        &mut self,
        id: ChangesetId,
        reviewer: &str,
        reason: &str,
    ) -> Result<Changeset, ModerationError> {
        let mut changeset = self.get_changeset(id)?;
        if changeset.status == ModerationStatus::Rejected {
            tracing::debug!(changeset_id = %id, "already rejected");
            return Ok(changeset);
        }

        changeset.transition(ModerationStatus::Rejected, reviewer, reason)?;
        self.changesets.save(&changeset)?;

        tracing::info!(changeset_id = %id, reviewer, "rejected changeset");
        self.emit(ModerationEvent::changeset_rejected(&changeset));
        Ok(changeset)
    }

    /// Unresolved changesets that reference this changeset's entity.
    /// A resolved changeset has none.
    pub fn dependents(&self, id: ChangesetId) -> Result<Vec<Changeset>, ModerationError> {
        let changeset = self.get_changeset(id)?;
        self.dependents_of(&changeset)
    }

    /// Approve a changeset, then its dependents and their dependents.
    pub fn approve_with_dependents(
        &mut self,
        id: ChangesetId,
        reviewer: &str,
        reason: &str,
    ) -> Result<CascadeReport, ModerationError> {
        self.cascade(id, |svc, target| svc.approve(target, reviewer, reason))
    }

    /// Reject a changeset, then its dependents and their dependents.
    pub fn reject_with_dependents(
        &mut self,
        id: ChangesetId,
        reviewer: &str,
        reason: &str,
    ) -> Result<CascadeReport, ModerationError> {
        self.cascade(id, |svc, target| svc.reject(target, reviewer, reason))
    }

    /// Dependents are collected before the parent is resolved, since a
    /// resolved parent has none. A parent failure aborts; dependent failures
    /// are recorded and the cascade continues.
    fn cascade<F>(&mut self, id: ChangesetId, mut resolve: F) -> Result<CascadeReport, ModerationError>
    where
        F: FnMut(&mut Self, ChangesetId) -> Result<Changeset, ModerationError>,
    {
        let targets = self.cascade_targets(id)?;
        let parent = resolve(&mut *self, id)?;

        let mut report = CascadeReport {
            parent,
            resolved: Vec::new(),
            failures: Vec::new(),
        };
        for target in targets {
            match resolve(&mut *self, target) {
                Ok(changeset) => report.resolved.push(changeset),
                Err(error) => {
                    tracing::warn!(parent = %id, changeset_id = %target, error = %error, "dependent not resolved");
                    report.failures.push(CascadeFailure {
                        changeset_id: target,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Dependents, then grand-dependents, without repeats.
    fn cascade_targets(&self, id: ChangesetId) -> Result<Vec<ChangesetId>, ModerationError> {
        let mut seen = BTreeSet::from([id]);
        let mut order = Vec::new();

        let children = self.dependents(id)?;
        for child in &children {
            if seen.insert(child.id) {
                order.push(child.id);
            }
        }
        for child in &children {
            for grandchild in self.dependents_of(child)? {
                if seen.insert(grandchild.id) {
                    order.push(grandchild.id);
                }
            }
        }
        Ok(order)
    }

    pub(crate) fn dependents_of(&self, changeset: &Changeset) -> Result<Vec<Changeset>, ModerationError> {
        if changeset.is_resolved() {
            return Ok(Vec::new());
        }
        let Some(target) = changeset.entity_id else {
            return Ok(Vec::new());
        };

        let referrers = self.registry.referrers(&changeset.entity_type);
        if referrers.is_empty() {
            return Ok(Vec::new());
        }

        let mut dependents = Vec::new();
        for candidate in self.changesets.list_unresolved(None)? {
            if candidate.id == changeset.id {
                continue;
            }
            let fields: Vec<&str> = referrers
                .iter()
                .filter(|r| r.entity_type == candidate.entity_type)
                .map(|r| r.field.as_str())
                .collect();
            if !fields.is_empty() && self.references(&candidate, &fields, target)? {
                dependents.push(candidate);
            }
        }
        Ok(dependents)
    }

    /// Whether `candidate` points at `target` through one of `fields`, either
    /// in its proposal or in the current state of its own entity.
    fn references(
        &self,
        candidate: &Changeset,
        fields: &[&str],
        target: EntityId,
    ) -> Result<bool, ModerationError> {
        let proposed = fields.iter().any(|field| {
            candidate
                .proposed_fields
                .get(*field)
                .and_then(|value| value.as_entity_id())
                == Some(target)
        });
        if proposed {
            return Ok(true);
        }

        let Some(own_id) = candidate.entity_id else {
            return Ok(false);
        };
        let Some(record) = self
            .entities
            .get(&candidate.entity_type, own_id, Visibility::All)?
        else {
            return Ok(false);
        };
        Ok(fields.iter().any(|field| {
            record.fields.get(*field).and_then(|value| value.as_entity_id()) == Some(target)
        }))
    }

    /// Delete a changeset that can never be applied.
    /// Returns the error the caller should surface.
    fn invalidate(
        &mut self,
        changeset: &Changeset,
        reason: String,
    ) -> Result<ModerationError, ModerationError> {
        self.changesets.remove(changeset.id)?;
        tracing::warn!(changeset_id = %changeset.id, reason = %reason, "removed invalid changeset");
        self.emit(ModerationEvent::ChangesetInvalidated {
            changeset_id: changeset.id,
            reason: reason.clone(),
            timestamp: chrono::Utc::now(),
        });
        Ok(ModerationError::InvalidChangeset {
            id: changeset.id,
            reason,
        })
    }
}
