//! Query command implementation.

use super::{render_fields, CliError, Context, OutputFormat};
use chrono::{DateTime, Utc};
use leaguesync_codec::{document_to_json_map, Value};
use leaguesync_core::{EventQuery, ID_FIELD};

/// Builds an event query from command-line arguments.
pub fn build_query(
    after: Option<&str>,
    filters: &[String],
    limit: Option<usize>,
) -> Result<EventQuery, CliError> {
    let mut query = EventQuery::new();
    if let Some(after) = after {
        query = query.after(parse_time(after)?);
    }
    for filter in filters {
        let (field, value) = parse_filter(filter)?;
        query = query.filter(field, value);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    Ok(query)
}

/// Parses an RFC 3339 time.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CliError::InvalidTime {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parses `field=value`; the value is typed as integer, float, bool or text.
///
/// The entity id is stored as text, so an `id` filter is never typed.
pub fn parse_filter(filter: &str) -> Result<(String, Value), CliError> {
    let (field, raw) = filter
        .split_once('=')
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| CliError::InvalidFilter(filter.to_string()))?;
    let value = if field == ID_FIELD {
        Value::Text(raw.to_string())
    } else if let Ok(n) = raw.parse::<i64>() {
        Value::Integer(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Text(raw.to_string())
    };
    Ok((field.to_string(), value))
}

/// Runs the query command.
pub async fn run(
    ctx: &Context,
    subject: &str,
    event_type: &str,
    query: &EventQuery,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let events = ctx.events.query_events(subject, event_type, query).await?;

    match format {
        OutputFormat::Json => {
            let rows = events
                .iter()
                .map(|event| document_to_json_map(&event.to_document()).map(serde_json::Value::Object))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for event in &events {
                println!(
                    "{} {:>8}  {}",
                    event.timestamp.to_rfc3339(),
                    event.id,
                    render_fields(&event.fields)
                );
            }
            println!("{} event(s)", events.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_are_typed() {
        assert_eq!(parse_filter("weekIndex=5").unwrap(), ("weekIndex".into(), Value::Integer(5)));
        assert_eq!(parse_filter("ratio=0.5").unwrap().1, Value::Float(0.5));
        assert_eq!(parse_filter("done=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_filter("name=Bears=1").unwrap().1, Value::from("Bears=1"));
        assert!(parse_filter("=5").is_err());
        assert!(parse_filter("weekIndex").is_err());
    }

    #[test]
    fn id_filter_stays_text() {
        assert_eq!(parse_filter("id=5").unwrap(), ("id".into(), Value::from("5")));
    }

    #[test]
    fn query_from_arguments() {
        let query = build_query(
            Some("2024-01-01T00:00:00Z"),
            &["weekIndex=5".to_string()],
            Some(10),
        )
        .unwrap();
        assert_eq!(query.after.unwrap().timestamp(), 1_704_067_200);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.limit, Some(10));
        assert!(build_query(Some("yesterday"), &[], None).is_err());
    }
}
