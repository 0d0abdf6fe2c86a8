//! Teams command implementation.

use super::{Context, OutputFormat};
use leaguesync_core::View;

/// Runs the teams command.
pub async fn run(ctx: &Context, subject: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let teams = ctx.team_summary.create_view(subject).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&teams)?),
        OutputFormat::Text => {
            let mut rows: Vec<_> = teams.values().collect();
            rows.sort_by(|a, b| b.ovr_rating.cmp(&a.ovr_rating).then_with(|| a.id.cmp(&b.id)));
            println!("{:<8} {:<24} {:>4} {:>7}", "ID", "NAME", "OVR", "RECORD");
            for team in rows {
                let record = match (team.wins, team.losses) {
                    (Some(w), Some(l)) => format!("{w}-{l}"),
                    _ => "-".to_string(),
                };
                println!(
                    "{:<8} {:<24} {:>4} {:>7}",
                    team.id,
                    team.name.as_deref().unwrap_or("-"),
                    team.ovr_rating.map_or_else(|| "-".to_string(), |o| o.to_string()),
                    record
                );
            }
        }
    }
    Ok(())
}
