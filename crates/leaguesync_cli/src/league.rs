//! League read models served by the CLI.

use leaguesync_codec::{JsonFormat, Value};
use leaguesync_core::view::EventsByType;
use leaguesync_core::{
    CacheConfig, CachedView, DurableView, EventStore, ReplayView, StoredEvent, UpdateFn,
};
use leaguesync_storage::{FileBlobStore, FileDocumentStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Event type of team snapshots.
pub const TEAMS: &str = "TEAMS";

/// One row of the team summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    /// Entity id.
    pub id: String,
    /// Display name, if the producer sent one.
    pub name: Option<String>,
    /// Overall rating.
    pub ovr_rating: Option<i64>,
    /// Wins, if known.
    pub wins: Option<i64>,
    /// Losses, if known.
    pub losses: Option<i64>,
}

impl TeamSummary {
    fn from_event(event: &StoredEvent) -> Self {
        let text = |field: &str| event.get(field).and_then(Value::as_text).map(str::to_string);
        let int = |field: &str| event.get(field).and_then(Value::as_integer);
        Self {
            id: event.id.clone(),
            name: text("displayName").or_else(|| text("teamName")),
            ovr_rating: int("ovrRating"),
            wins: int("totalWins"),
            losses: int("totalLosses"),
        }
    }
}

/// Team summaries of one subject, keyed by team id.
pub type TeamSummaries = BTreeMap<String, TeamSummary>;

/// Folds team snapshots into the summary.
pub fn team_summary_update() -> UpdateFn<TeamSummaries> {
    Arc::new(|events: &EventsByType, mut current: TeamSummaries| {
        let Some(teams) = events.get(TEAMS) else {
            return current;
        };
        for team in teams {
            current.insert(team.id.clone(), TeamSummary::from_event(team));
        }
        current
    })
}

/// The team summary, persisted next to the document store.
pub type TeamSummaryView =
    DurableView<ReplayView<FileDocumentStore, TeamSummaries>, FileBlobStore, JsonFormat>;

/// Builds the team summary view.
pub fn team_summary_view(
    events: Arc<EventStore<FileDocumentStore>>,
    blobs: Arc<FileBlobStore>,
) -> TeamSummaryView {
    let replay = ReplayView::new(
        "team_summary",
        events,
        [TEAMS],
        |_| TeamSummaries::new(),
        team_summary_update(),
    );
    CachedView::durable(
        replay,
        blobs,
        JsonFormat,
        team_summary_update(),
        &CacheConfig::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leaguesync_codec::Document;

    fn team_event(id: &str, ovr: i64) -> StoredEvent {
        let mut fields = Document::new();
        fields.insert("displayName".into(), Value::from("Bears"));
        fields.insert("ovrRating".into(), Value::Integer(ovr));
        StoredEvent {
            subject: "17".into(),
            event_type: TEAMS.into(),
            id: id.into(),
            timestamp: Utc::now(),
            fields,
        }
    }

    #[test]
    fn update_replaces_team_rows() {
        let update = team_summary_update();
        let mut events = EventsByType::new();
        events.insert(TEAMS.into(), vec![team_event("1", 80)]);
        let first = update(&events, TeamSummaries::new());
        assert_eq!(first["1"].ovr_rating, Some(80));
        assert_eq!(first["1"].name.as_deref(), Some("Bears"));

        events.insert(TEAMS.into(), vec![team_event("1", 82)]);
        let second = update(&events, first);
        assert_eq!(second.len(), 1);
        assert_eq!(second["1"].ovr_rating, Some(82));
    }

    #[test]
    fn other_event_types_are_ignored() {
        let update = team_summary_update();
        let mut events = EventsByType::new();
        events.insert("SCHEDULE".into(), vec![team_event("1", 80)]);
        assert!(update(&events, TeamSummaries::new()).is_empty());
    }
}
