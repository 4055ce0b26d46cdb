// submit.rs — `mq submit`: stage a creation or an edit.

use anyhow::{anyhow, Context};
use clap::Args;
use mq_changeset::{EntityId, EntityTypeDescriptor, FieldKind, FieldMap, FieldValue};
use mq_moderation::{Actor, Submission};
use serde_json::json;

use super::{print_json, Output};
use crate::project::ProjectLayout;

#[derive(Args)]
pub struct SubmitArgs {
    /// Entity type.
    pub entity_type: String,

    /// Existing entity ID. Omit to propose a new entity.
    #[arg(long)]
    pub id: Option<u64>,

    /// Field assignment NAME=VALUE (repeatable). JSON scalars such as 31,
    /// true, or null are decoded; anything else is taken as text.
    #[arg(long = "field", short = 'f', value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Who is submitting. Anonymous when omitted.
    #[arg(long)]
    pub submitter: Option<String>,

    /// The submitter has administrator rights (see `elevated_skip`).
    #[arg(long)]
    pub elevated: bool,

    /// Apply immediately without review.
    #[arg(long)]
    pub bypass: bool,
}

pub fn execute(layout: &ProjectLayout, args: &SubmitArgs, output: Output) -> anyhow::Result<()> {
    let mut service = layout.open()?;
    let descriptor = service.registry().descriptor(&args.entity_type)?;
    let fields = parse_fields(descriptor, &args.fields)?;

    let actor = Actor {
        id: args.submitter.clone(),
        elevated: args.elevated,
    };
    let bypass = args.bypass || service.config().should_bypass(&actor);

    let mut submission = match args.id {
        Some(id) => Submission::update(args.entity_type.as_str(), EntityId(id), fields),
        None => Submission::create(args.entity_type.as_str(), fields),
    };
    submission.submitter = actor.id;
    submission.bypass = bypass;

    let outcome = service
        .submit(submission)
        .with_context(|| format!("failed to submit {}", args.entity_type))?;
    layout.save(service)?;

    if output.json {
        return print_json(&json!({
            "entity": outcome.entity,
            "changeset": outcome.changeset,
        }));
    }

    println!("Entity: {} #{}", args.entity_type, outcome.entity.id);
    match &outcome.changeset {
        Some(cs) => println!(
            "Changeset {} staged ({}, {} field(s)).",
            cs.id,
            cs.status,
            cs.proposed_fields.len()
        ),
        None if bypass => println!("Applied directly, moderation bypassed."),
        None => println!("No changes to stage."),
    }
    Ok(())
}

/// Parse `NAME=VALUE` assignments using each field's kind.
fn parse_fields(descriptor: &EntityTypeDescriptor, raw: &[String]) -> anyhow::Result<FieldMap> {
    raw.iter()
        .map(|assignment| {
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", assignment))?;
            let name = name.trim();
            let kind = descriptor.field(name).map(|f| &f.kind);
            Ok((name.to_string(), parse_value(kind, value)?))
        })
        .collect()
}

fn parse_value(kind: Option<&FieldKind>, raw: &str) -> anyhow::Result<FieldValue> {
    match kind {
        Some(FieldKind::ManyRelation { .. }) => {
            let ids = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<u64>()
                        .map(EntityId)
                        .with_context(|| format!("'{}' is not an entity id", id))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(FieldValue::IdList(ids))
        }
        Some(FieldKind::TagList | FieldKind::FileReference) if raw != "null" => {
            Ok(FieldValue::text(raw))
        }
        _ => Ok(decode_scalar(raw)),
    }
}

fn decode_scalar(raw: &str) -> FieldValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => FieldValue::Null,
        Ok(serde_json::Value::Bool(b)) => FieldValue::Bool(b),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => FieldValue::Int(i),
            None => n.as_f64().map_or_else(|| FieldValue::text(raw), FieldValue::Float),
        },
        Ok(serde_json::Value::String(s)) => FieldValue::Text(s),
        _ => FieldValue::text(raw),
    }
}
