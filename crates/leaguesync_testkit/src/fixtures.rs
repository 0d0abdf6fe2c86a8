//! Fixtures and harnesses.

use chrono::{DateTime, Duration, TimeZone, Utc};
use leaguesync_codec::{Document, Value};
use leaguesync_core::{
    Clock, EventStore, NotifierRegistry, RetryConfig, SnapshotEvent, StoreConfig, StoredEvent,
    SyncStats,
};
use leaguesync_storage::{FileDocumentStore, InMemoryDocumentStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

/// Event type of team snapshots.
pub const TEAMS: &str = "TEAMS";

/// Event type of schedule snapshots.
pub const SCHEDULE: &str = "SCHEDULE";

/// Builds a document from field/value pairs.
pub fn doc<I, K, V>(pairs: I) -> Document
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// A team entity.
pub fn team(id: i64, ovr_rating: i64) -> Document {
    doc([
        ("teamId", Value::Integer(id)),
        ("ovrRating", Value::Integer(ovr_rating)),
        ("displayName", Value::Text(format!("Team {id}"))),
    ])
}

/// A batch of team entities from `(id, ovr_rating)` pairs.
pub fn team_batch(teams: &[(i64, i64)]) -> Vec<Document> {
    teams.iter().map(|(id, ovr)| team(*id, *ovr)).collect()
}

/// Team snapshot events for `subject`.
pub fn team_events(subject: &str, teams: &[(i64, i64)]) -> Vec<SnapshotEvent> {
    SnapshotEvent::batch(subject, TEAMS, team_batch(teams))
}

/// A schedule entry.
pub fn schedule(id: i64, week_index: i64) -> Document {
    doc([
        ("scheduleId", Value::Integer(id)),
        ("weekIndex", Value::Integer(week_index)),
        ("homeTeamId", Value::Integer(id % 32)),
        ("awayTeamId", Value::Integer((id + 1) % 32)),
    ])
}

/// A clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    /// Starts at `start`, advancing by `step` per call.
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Starts at 2024-01-01T00:00:00Z, advancing one second per call.
    pub fn seconds() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid start date");
        Self::new(start, Duration::seconds(1))
    }

    /// The time the next reading will return.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.next.lock()
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock();
        let now = *next;
        *next = now + self.step;
        now
    }
}

/// A retry configuration fast enough for tests.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::new(max_attempts, std::time::Duration::from_millis(1))
}

/// An event store wired to a fresh registry, stepping clock and stats.
pub struct TestHarness<S> {
    /// The document store.
    pub docs: Arc<S>,
    /// The notifier registry.
    pub registry: Arc<NotifierRegistry>,
    /// The clock stamping events.
    pub clock: Arc<StepClock>,
    /// Shared statistics.
    pub stats: Arc<SyncStats>,
    /// The event store.
    pub events: Arc<EventStore<S>>,
    _temp_dir: Option<TempDir>,
}

impl TestHarness<InMemoryDocumentStore> {
    /// A harness over an in-memory document store.
    pub fn memory() -> Self {
        Self::build(Arc::new(InMemoryDocumentStore::new()), None)
    }
}

impl TestHarness<FileDocumentStore> {
    /// A harness over a file-backed store in a temporary directory.
    pub async fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let docs = FileDocumentStore::open(temp_dir.path().join("documents.cbor"))
            .await
            .expect("Failed to open file store");
        Self::build(Arc::new(docs), Some(temp_dir))
    }

    /// The temporary directory holding the store.
    pub fn dir(&self) -> &std::path::Path {
        self._temp_dir
            .as_ref()
            .map(TempDir::path)
            .expect("file harness has a directory")
    }
}

impl<S: leaguesync_storage::DocumentStore> TestHarness<S> {
    fn build(docs: Arc<S>, temp_dir: Option<TempDir>) -> Self {
        let registry = Arc::new(NotifierRegistry::new());
        let clock = Arc::new(StepClock::seconds());
        let stats = Arc::new(SyncStats::new());
        let events = EventStore::new(Arc::clone(&docs), Arc::clone(&registry))
            .with_config(StoreConfig::new().with_retry(fast_retry(3)))
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_stats(Arc::clone(&stats));
        Self {
            docs,
            registry,
            clock,
            stats,
            events: Arc::new(events),
            _temp_dir: temp_dir,
        }
    }
}

/// A listener that records every batch it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    batches: Arc<Mutex<Vec<Vec<StoredEvent>>>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the recorder for `event_type`.
    pub fn register(&self, registry: &NotifierRegistry, event_type: &str) {
        let batches = Arc::clone(&self.batches);
        registry.on(event_type, move |events: Vec<StoredEvent>| {
            let batches = Arc::clone(&batches);
            async move {
                batches.lock().push(events);
                Ok(())
            }
        });
    }

    /// The batches received so far.
    pub fn batches(&self) -> Vec<Vec<StoredEvent>> {
        self.batches.lock().clone()
    }

    /// Ids of every event received, in order.
    pub fn ids(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|event| event.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_clock_advances() {
        let clock = StepClock::seconds();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, Duration::seconds(1));
        assert_eq!(clock.peek() - b, Duration::seconds(1));
    }

    #[test]
    fn team_fixture_shape() {
        let t = team(4, 80);
        assert_eq!(t["teamId"], Value::Integer(4));
        assert_eq!(t["ovrRating"], Value::Integer(80));
        assert_eq!(team_events("17", &[(1, 80), (2, 70)]).len(), 2);
    }
}
