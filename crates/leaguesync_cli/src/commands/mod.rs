//! CLI command implementations.

pub mod digest;
pub mod history;
pub mod ingest;
pub mod query;
pub mod teams;

use crate::league::{team_summary_view, TeamSummaryView, TEAMS};
use leaguesync_codec::{Document, Value};
use leaguesync_core::{EventStore, NotifierRegistry, SyncStats};
use leaguesync_storage::{FileBlobStore, FileDocumentStore};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by command argument handling.
#[derive(Debug, Error)]
pub enum CliError {
    /// A filter was not of the form `field=value`.
    #[error("invalid filter {0:?}, expected field=value")]
    InvalidFilter(String),

    /// A timestamp could not be parsed.
    #[error("invalid time {value:?}: {reason}")]
    InvalidTime {
        /// The input.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// An unknown output format was requested.
    #[error("unknown format {0:?}, expected text or json")]
    UnknownFormat(String),
}

/// Output format of listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses `text` or `json`.
    pub fn parse(format: &str) -> Result<Self, CliError> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

/// Services shared by the commands, opened from the data directory.
pub struct Context {
    /// The event store.
    pub events: Arc<EventStore<FileDocumentStore>>,
    /// The team summary view.
    pub team_summary: TeamSummaryView,
}

impl Context {
    /// Opens the document store and view storage under `data_dir`, and
    /// subscribes the views to the notifier registry.
    pub async fn open(data_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let docs = FileDocumentStore::open(data_dir.join("documents.cbor")).await?;
        let blobs = Arc::new(FileBlobStore::new(data_dir.join("blobs")));
        debug!(data_dir = %data_dir.display(), documents = docs.len(), "opened data directory");

        let registry = Arc::new(NotifierRegistry::new());
        let stats = Arc::new(SyncStats::new());
        let events = Arc::new(
            EventStore::new(Arc::new(docs), Arc::clone(&registry)).with_stats(Arc::clone(&stats)),
        );
        let team_summary = team_summary_view(Arc::clone(&events), blobs).with_stats(stats);
        team_summary.listen(&registry, [TEAMS]);

        Ok(Self {
            events,
            team_summary,
        })
    }
}

/// Renders a document as `field=value` pairs.
pub fn render_fields(doc: &Document) -> String {
    doc.iter()
        .map(|(field, value)| format!("{field}={}", render_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders one value for text output.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other
            .to_json()
            .map(|json| json.to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}
