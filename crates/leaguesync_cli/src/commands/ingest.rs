//! Ingest command implementation.

use super::Context;
use leaguesync_codec::documents_from_json_str;
use leaguesync_core::id_field;
use std::path::Path;
use tracing::info;

/// Runs the ingest command.
pub async fn run(
    ctx: &Context,
    subject: &str,
    event_type: &str,
    id_field_name: &str,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(file).await?;
    let entities = documents_from_json_str(&text)?;
    info!(file = %file.display(), entities = entities.len(), "read snapshot");

    let report = ctx
        .events
        .append_changed(subject, event_type, entities, id_field(id_field_name))
        .await?;

    println!("Subject:    {subject}");
    println!("Event type: {event_type}");
    println!("Entities:   {}", report.total);
    println!("Changed:    {}", report.changed);
    println!("Committed:  {}", report.committed);
    Ok(())
}
