//! History command implementation.

use super::{render_value, Context};
use leaguesync_codec::Value;

/// Runs the history command.
pub async fn run(
    ctx: &Context,
    subject: &str,
    event_type: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(current) = ctx.events.get_event(subject, event_type, id).await? else {
        return Err(format!("No {event_type} entity {id:?} for subject {subject:?}").into());
    };
    println!("{event_type} {id} (last stored {})", current.timestamp.to_rfc3339());

    let history = ctx.events.history(subject, event_type, id).await?;
    if history.is_empty() {
        println!("  no recorded changes");
    }
    let side = |value: &Option<Value>| value.as_ref().map_or_else(|| "-".to_string(), render_value);
    for record in &history {
        println!("  {}", record.timestamp.to_rfc3339());
        for (field, change) in &record.changes {
            println!(
                "    {field}: {} -> {}",
                side(&change.old_value),
                side(&change.new_value)
            );
        }
    }
    Ok(())
}
