// queue.rs — Review commands: pending, show, approve, reject.

use anyhow::Context;
use clap::Args;
use mq_changeset::{Changeset, ChangesetId, DiffEntry};
use mq_moderation::CascadeReport;
use serde_json::json;

use super::{print_json, truncate, Output};
use crate::project::ProjectLayout;

/// Reviewer details shared by approve and reject.
#[derive(Args)]
pub struct ReviewArgs {
    /// Who is reviewing.
    #[arg(long, default_value = "moderator")]
    pub reviewer: String,
    /// Reason recorded on the changeset.
    #[arg(long, default_value = "")]
    pub reason: String,
    /// Also resolve dependent changesets (two levels deep).
    #[arg(long)]
    pub cascade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn infinitive(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

pub fn pending(
    layout: &ProjectLayout,
    entity_type: Option<&str>,
    output: Output,
) -> anyhow::Result<()> {
    let service = layout.open()?;
    let pending = service.list_pending(entity_type)?;

    if output.json {
        return print_json(&pending);
    }
    if pending.is_empty() {
        println!("No pending changesets.");
        return Ok(());
    }

    println!(
        "{:<6} {:<16} {:<8} {:<9} {:<16} {:<7} {:<20}",
        "ID", "TYPE", "ENTITY", "STATUS", "SUBMITTER", "FIELDS", "CREATED"
    );
    println!("{}", "-".repeat(88));
    for cs in &pending {
        println!(
            "{:<6} {:<16} {:<8} {:<9} {:<16} {:<7} {:<20}",
            cs.id.to_string(),
            truncate(&cs.entity_type, 16),
            cs.entity_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cs.status.to_string(),
            truncate(cs.submitter.as_deref().unwrap_or("(anonymous)"), 16),
            cs.proposed_fields.len(),
            cs.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }
    println!("\n{} changeset(s) pending.", pending.len());
    Ok(())
}

pub fn show(layout: &ProjectLayout, id: ChangesetId, output: Output) -> anyhow::Result<()> {
    let service = layout.open()?;
    let details = service.review_details(id)?;

    if output.json {
        return print_json(&details);
    }

    print_header(&details.changeset);
    println!();
    print_diff(&details.diff);

    if !details.dependents.is_empty() {
        println!("\nDependent changesets ({}):", details.dependents.len());
        for dependent in &details.dependents {
            println!(
                "\n  #{} {} ({})",
                dependent.changeset.id, dependent.changeset.entity_type, dependent.changeset.status
            );
            for entry in dependent.diff.iter().filter(|e| e.changed) {
                println!("    {}: {} -> {}", entry.field, entry.old_value, entry.new_value);
            }
        }
    }
    Ok(())
}

pub fn resolve(
    layout: &ProjectLayout,
    id: ChangesetId,
    decision: Decision,
    review: &ReviewArgs,
    output: Output,
) -> anyhow::Result<()> {
    let mut service = layout.open()?;
    let (reviewer, reason) = (review.reviewer.as_str(), review.reason.as_str());

    if review.cascade {
        let report = match decision {
            Decision::Approve => service.approve_with_dependents(id, reviewer, reason),
            Decision::Reject => service.reject_with_dependents(id, reviewer, reason),
        }
        .with_context(|| format!("failed to {} changeset {}", decision.infinitive(), id))?;
        layout.save(service)?;
        print_report(&report, decision, output)?;
        if !report.is_complete() {
            anyhow::bail!(
                "{} of {} dependent changeset(s) could not be {}",
                report.failures.len(),
                report.failures.len() + report.resolved.len(),
                decision.verb()
            );
        }
        return Ok(());
    }

    let changeset = match decision {
        Decision::Approve => service.approve(id, reviewer, reason),
        Decision::Reject => service.reject(id, reviewer, reason),
    }
    .with_context(|| format!("failed to {} changeset {}", decision.infinitive(), id))?;
    layout.save(service)?;

    if output.json {
        return print_json(&changeset);
    }
    println!("Changeset {} {}.", changeset.id, changeset.status);
    if let Some(entity_id) = changeset.entity_id {
        println!("  Entity: {} #{}", changeset.entity_type, entity_id);
    }
    Ok(())
}

fn print_report(report: &CascadeReport, decision: Decision, output: Output) -> anyhow::Result<()> {
    if output.json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|f| json!({ "changeset_id": f.changeset_id, "error": f.error.to_string() }))
            .collect();
        return print_json(&json!({
            "parent": report.parent,
            "resolved": report.resolved,
            "failures": failures,
        }));
    }

    println!("Changeset {} {}.", report.parent.id, report.parent.status);
    for cs in &report.resolved {
        println!("  dependent {} {}", cs.id, decision.verb());
    }
    for failure in &report.failures {
        println!("  dependent {} FAILED: {}", failure.changeset_id, failure.error);
    }
    Ok(())
}

fn print_header(cs: &Changeset) {
    println!("Changeset: {}", cs.id);
    println!("Type:      {}", cs.entity_type);
    match cs.entity_id {
        Some(id) => println!("Entity:    #{}", id),
        None => println!("Entity:    (not yet created)"),
    }
    println!("Status:    {}", cs.status);
    println!(
        "Submitter: {}",
        cs.submitter.as_deref().unwrap_or("(anonymous)")
    );
    println!("Created:   {}", cs.created_at.to_rfc3339());
    if let Some(reviewer) = &cs.reviewer {
        println!("Reviewer:  {}", reviewer);
    }
    if let Some(at) = cs.reviewed_at {
        println!("Reviewed:  {}", at.to_rfc3339());
    }
    if !cs.review_reason.is_empty() {
        println!("Reason:    {}", cs.review_reason);
    }
}

fn print_diff(diff: &[DiffEntry]) {
    println!("  {:<20} {:<28} {:<28}", "FIELD", "CURRENT", "PROPOSED");
    println!("  {}", "-".repeat(78));
    for entry in diff {
        let marker = if entry.changed { "*" } else { " " };
        println!(
            "{} {:<20} {:<28} {:<28}",
            marker,
            truncate(&entry.field, 20),
            truncate(&entry.old_value.to_string(), 28),
            truncate(&entry.new_value.to_string(), 28),
        );
    }
}
