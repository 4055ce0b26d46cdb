// entities.rs — Entity inspection: list and moderation status.

use mq_changeset::EntityId;
use mq_registry::Visibility;
use serde_json::json;

use super::{print_json, truncate, Output};
use crate::project::ProjectLayout;

pub fn list(
    layout: &ProjectLayout,
    entity_type: &str,
    all: bool,
    output: Output,
) -> anyhow::Result<()> {
    let service = layout.open()?;
    let visibility = if all { Visibility::All } else { Visibility::Live };
    let records = service.list_entities(entity_type, visibility)?;

    if output.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No {} entities found.", entity_type);
        return Ok(());
    }

    println!("{:<8} {:<10} {:<60}", "ID", "STATUS", "FIELDS");
    println!("{}", "-".repeat(80));
    for record in &records {
        let status = service.entity_status(entity_type, record.id)?;
        let fields: Vec<String> = record
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!(
            "{:<8} {:<10} {:<60}",
            record.id.to_string(),
            status.to_string(),
            truncate(&fields.join("; "), 60)
        );
    }
    println!("\n{} entity(ies).", records.len());
    Ok(())
}

pub fn status(
    layout: &ProjectLayout,
    entity_type: &str,
    id: u64,
    output: Output,
) -> anyhow::Result<()> {
    let service = layout.open()?;
    let id = EntityId(id);
    let status = service.entity_status(entity_type, id)?;
    let outstanding: Vec<_> = service
        .list_pending(Some(entity_type))?
        .into_iter()
        .filter(|cs| cs.entity_id == Some(id))
        .collect();

    if output.json {
        return print_json(&json!({
            "entity_type": entity_type,
            "id": id,
            "status": status,
            "pending_changesets": outstanding.iter().map(|cs| cs.id).collect::<Vec<_>>(),
        }));
    }

    println!("{} #{}: {}", entity_type, id, status);
    for cs in &outstanding {
        let fields: Vec<&str> = cs.proposed_fields.keys().map(String::as_str).collect();
        println!("  changeset {} ({}): {}", cs.id, cs.status, fields.join(", "));
    }
    Ok(())
}
