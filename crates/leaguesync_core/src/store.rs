//! The event store.

use crate::clock::{Clock, SystemClock};
use crate::config::{StoreConfig, STORE_OWNED_FIELDS};
use crate::digest::{DigestTree, DigestTreeStore, Sha256Hasher, DIGEST_COLLECTION};
use crate::error::{CoreError, CoreResult};
use crate::event::{HistoryRecord, SnapshotEvent, StoredEvent};
use crate::history::diff_fields;
use crate::notifier::NotifierRegistry;
use crate::stats::SyncStats;
use chrono::{DateTime, Utc};
use leaguesync_codec::{Document, Value};
use leaguesync_storage::{DocPath, DocumentStore, Direction, RangeQuery, SetMode, WriteBatch};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Top-level collection for all league data.
pub const ROOT_COLLECTION: &str = "league_data";

/// Sub-collection holding an entity's history records.
pub const HISTORY_COLLECTION: &str = "history";

/// Field holding a stored event's insertion time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field holding a stored event's entity id, always stored as text.
pub const ID_FIELD: &str = "id";

/// Read-side filter for [`EventStore::query_events`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    /// Only events stored strictly after this instant.
    pub after: Option<DateTime<Utc>>,
    /// Equality filters on entity fields.
    pub filters: Vec<(String, Value)>,
    /// Maximum number of events.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Creates a query matching every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events stored strictly after `after`.
    #[must_use]
    pub fn after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Caps the number of events.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_range_query(&self) -> RangeQuery {
        let mut query = RangeQuery::new().order_by(TIMESTAMP_FIELD, Direction::Descending);
        if let Some(after) = self.after {
            query = query.after(TIMESTAMP_FIELD, after.timestamp_millis());
        }
        for (field, value) in &self.filters {
            query = query.filter(field.clone(), value.clone());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

/// Result of a digest-gated ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entities offered.
    pub total: usize,
    /// Entities whose content changed since the previous batch.
    pub changed: usize,
    /// Snapshots written.
    pub committed: usize,
}

/// Append-only store of entity snapshots with field-level history.
///
/// Each `(subject, event type, id)` has one current snapshot at
/// `league_data/{subject}/{event_type}/{id}`. When an update changes a
/// top-level scalar field, a [`HistoryRecord`] is written beneath it at
/// `.../{id}/history/{history_id}`.
///
/// # Single writer
///
/// Updates are read-modify-write without a version check. Exactly one
/// ingestion task may append to a given subject at a time; concurrent
/// writers of the same entity can record history against a stale
/// baseline.
pub struct EventStore<S> {
    store: Arc<S>,
    registry: Arc<NotifierRegistry>,
    digests: DigestTreeStore<S>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<SyncStats>,
    hasher: Sha256Hasher,
    history_seq: AtomicU64,
}

impl<S: DocumentStore> EventStore<S> {
    /// Creates an event store with default configuration.
    pub fn new(store: Arc<S>, registry: Arc<NotifierRegistry>) -> Self {
        Self {
            digests: DigestTreeStore::new(Arc::clone(&store)),
            store,
            registry,
            config: StoreConfig::default(),
            clock: Arc::new(SystemClock),
            stats: Arc::new(SyncStats::new()),
            hasher: Sha256Hasher,
            history_seq: AtomicU64::new(0),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares a statistics sink, e.g. with the views.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<SyncStats>) -> Self {
        self.stats = stats;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The notifier registry.
    pub fn registry(&self) -> &Arc<NotifierRegistry> {
        &self.registry
    }

    /// Statistics.
    pub fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    /// The underlying document store.
    pub fn document_store(&self) -> &Arc<S> {
        &self.store
    }

    /// Upserts a batch of snapshots.
    ///
    /// For each event the current snapshot is looked up by
    /// `(subject, event type, id_fn(fields))`. If one exists and a scalar
    /// field changed, a history record is written. The snapshot is always
    /// overwritten with the event, a fresh timestamp and the id. All
    /// writes commit as one batch, retried per [`StoreConfig::retry`].
    ///
    /// After the commit, listeners registered for each event type receive
    /// that type's events. Returns the stored events.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEvent`] if an event has no id,
    /// [`CoreError::CommitAbandoned`] if every commit attempt failed
    /// transiently, or the storage error if one is not retryable. Nothing
    /// is written and no listener runs on error.
    pub async fn append_events<F>(&self, events: Vec<SnapshotEvent>, id_fn: F) -> CoreResult<Vec<StoredEvent>>
    where
        F: Fn(&Document) -> Option<String> + Send + Sync,
    {
        self.append_with(events, &id_fn, WriteBatch::new()).await
    }

    /// Appends `events` on top of the writes already in `batch`; both
    /// commit together.
    async fn append_with<F>(
        &self,
        events: Vec<SnapshotEvent>,
        id_fn: &F,
        mut batch: WriteBatch,
    ) -> CoreResult<Vec<StoredEvent>>
    where
        F: Fn(&Document) -> Option<String> + Send + Sync,
    {
        if events.is_empty() && batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut staged: HashMap<DocPath, Document> = HashMap::new();
        let mut stored = Vec::with_capacity(events.len());
        let mut history_records = 0u64;

        for event in events {
            let id = id_fn(&event.fields).ok_or_else(|| {
                CoreError::invalid_event(format!(
                    "{}/{} event has no id",
                    event.subject, event.event_type
                ))
            })?;
            let path = snapshot_path(&event.subject, &event.event_type, &id)?;

            let current = match staged.get(&path) {
                Some(doc) => Some(doc.clone()),
                None => self.store.get(&path).await?,
            };
            let now = self.clock.now();

            if let Some(previous) = current {
                let changes = diff_fields(&previous, &event.fields, &self.config.history_fields);
                if !changes.is_empty() {
                    let record = HistoryRecord {
                        changes,
                        timestamp: now,
                    };
                    let history_path = path.child(HISTORY_COLLECTION, self.next_history_id(now))?;
                    batch.set(history_path, record.to_document(), SetMode::Overwrite);
                    history_records += 1;
                }
            }

            let mut fields = event.fields;
            for owned in STORE_OWNED_FIELDS {
                fields.remove(*owned);
            }
            let event = StoredEvent {
                subject: event.subject,
                event_type: event.event_type,
                id,
                timestamp: now,
                fields,
            };
            let doc = event.to_document();
            batch.set(path.clone(), doc.clone(), SetMode::Overwrite);
            staged.insert(path, doc);
            stored.push(event);
        }

        self.commit_with_retry(batch).await?;
        self.stats.record_events_appended(stored.len() as u64);
        self.stats.record_history_records(history_records);
        debug!(
            events = stored.len(),
            history_records, "committed event batch"
        );

        if !stored.is_empty() {
            let outcome = self.registry.notify(&stored).await;
            self.stats.record_listener_invocations(outcome.invoked);
            self.stats.record_listener_failures(outcome.failed);
        }
        Ok(stored)
    }

    /// Appends only the entities whose content changed since the last
    /// batch of `batch_type` for `subject`.
    ///
    /// The digest tree of `entities` is diffed against the stored one.
    /// Changed entities are appended, and the new tree is written in the
    /// same commit. Nothing is written when the trees are identical.
    ///
    /// # Errors
    ///
    /// Same as [`append_events`](Self::append_events). On error neither
    /// the snapshots nor the tree are written, so the next batch retries
    /// the same entities.
    pub async fn append_changed<F>(
        &self,
        subject: &str,
        batch_type: &str,
        entities: Vec<Document>,
        id_fn: F,
    ) -> CoreResult<IngestReport>
    where
        F: Fn(&Document) -> Option<String> + Send + Sync,
    {
        let tree = DigestTree::build(&entities, &id_fn, &self.config.hash_fields, &self.hasher)?;
        let previous = self.digests.get(subject, batch_type, &self.hasher).await?;
        let changed: HashSet<String> = tree.changed_keys(&previous).into_iter().collect();

        let total = entities.len();
        let to_append: Vec<Document> = entities
            .into_iter()
            .filter(|entity| id_fn(entity).is_some_and(|id| changed.contains(&id)))
            .collect();
        let changed = to_append.len();
        self.stats.record_entities_skipped((total - changed) as u64);

        let mut batch = WriteBatch::new();
        if tree.root_hash() != previous.root_hash() {
            DigestTreeStore::<S>::stage(&mut batch, subject, batch_type, &tree)?;
        }
        let committed = self
            .append_with(SnapshotEvent::batch(subject, batch_type, to_append), &id_fn, batch)
            .await?
            .len();

        info!(subject, batch_type, total, changed, "ingested batch");
        Ok(IngestReport {
            total,
            changed,
            committed,
        })
    }

    /// Returns events of one type for `subject`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn query_events(
        &self,
        subject: &str,
        event_type: &str,
        query: &EventQuery,
    ) -> CoreResult<Vec<StoredEvent>> {
        let collection = event_collection(subject, event_type)?;
        let docs = self.store.query(&collection, &query.to_range_query()).await?;
        Ok(to_events(subject, event_type, docs))
    }

    /// Returns every current snapshot of one type, oldest first.
    ///
    /// This is the source for full view recomputes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn scan(&self, subject: &str, event_type: &str) -> CoreResult<Vec<StoredEvent>> {
        let collection = event_collection(subject, event_type)?;
        let query = RangeQuery::new().order_by(TIMESTAMP_FIELD, Direction::Ascending);
        let docs = self.store.query(&collection, &query).await?;
        Ok(to_events(subject, event_type, docs))
    }

    /// Returns the current snapshot of one entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn get_event(&self, subject: &str, event_type: &str, id: &str) -> CoreResult<Option<StoredEvent>> {
        let path = snapshot_path(subject, event_type, id)?;
        Ok(self
            .store
            .get(&path)
            .await?
            .and_then(|doc| StoredEvent::from_document(subject, event_type, doc)))
    }

    /// Returns the history records of one entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn history(&self, subject: &str, event_type: &str, id: &str) -> CoreResult<Vec<HistoryRecord>> {
        let collection = snapshot_path(subject, event_type, id)?.join(HISTORY_COLLECTION)?;
        let query = RangeQuery::new().order_by(TIMESTAMP_FIELD, Direction::Ascending);
        let docs = self.store.query(&collection, &query).await?;
        Ok(docs
            .into_iter()
            .filter_map(|(_, doc)| HistoryRecord::from_document(doc))
            .collect())
    }

    async fn commit_with_retry(&self, batch: WriteBatch) -> CoreResult<()> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.commit(batch.clone()).await {
                Ok(()) => {
                    self.stats.record_commits(1);
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        error = %e,
                        "commit failed, retrying"
                    );
                    self.stats.record_commit_retries(1);
                    tokio::time::sleep(retry.delay).await;
                }
                Err(e) if e.is_retryable() => {
                    error!(attempts = attempt, error = %e, "commit abandoned");
                    self.stats.record_commits_abandoned(1);
                    return Err(CoreError::CommitAbandoned {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Time-ordered history document id: zero-padded millis plus a
    /// sequence number.
    fn next_history_id(&self, now: DateTime<Utc>) -> String {
        let seq = self.history_seq.fetch_add(1, Ordering::Relaxed);
        format!("{:013}-{:06}", now.timestamp_millis(), seq)
    }
}

impl<S> std::fmt::Debug for EventStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Path of the collection holding one event type's snapshots.
///
/// # Errors
///
/// Returns an error if a segment is empty, contains a slash, or the event
/// type collides with the digest collection.
pub fn event_collection(subject: &str, event_type: &str) -> CoreResult<DocPath> {
    if event_type == DIGEST_COLLECTION {
        return Err(CoreError::invalid_event(format!(
            "event type {event_type:?} is reserved"
        )));
    }
    Ok(DocPath::collection(ROOT_COLLECTION)?
        .join(subject)?
        .join(event_type)?)
}

/// Path of one entity's current snapshot.
///
/// # Errors
///
/// Returns an error if a segment is invalid.
pub fn snapshot_path(subject: &str, event_type: &str, id: &str) -> CoreResult<DocPath> {
    Ok(event_collection(subject, event_type)?.join(id)?)
}

fn to_events(subject: &str, event_type: &str, docs: Vec<(DocPath, Document)>) -> Vec<StoredEvent> {
    docs.into_iter()
        .filter_map(|(path, doc)| {
            let event = StoredEvent::from_document(subject, event_type, doc);
            if event.is_none() {
                warn!(path = %path, "skipping malformed snapshot");
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::id_field;
    use crate::event::millis_to_datetime;
    use leaguesync_storage::{InMemoryDocumentStore, StorageError};
    use parking_lot::Mutex;
    use std::time::Duration;

    struct TickClock(Mutex<i64>);

    impl Clock for TickClock {
        fn now(&self) -> DateTime<Utc> {
            let mut millis = self.0.lock();
            *millis += 1_000;
            millis_to_datetime(*millis).unwrap()
        }
    }

    fn store() -> (Arc<InMemoryDocumentStore>, EventStore<InMemoryDocumentStore>) {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let events = EventStore::new(Arc::clone(&docs), Arc::new(NotifierRegistry::new()))
            .with_clock(Arc::new(TickClock(Mutex::new(1_700_000_000_000))))
            .with_config(
                StoreConfig::new().with_retry(crate::RetryConfig::new(3, Duration::from_millis(1))),
            );
        (docs, events)
    }

    fn team(id: i64, ovr: i64) -> Document {
        [
            ("teamId".to_string(), Value::Integer(id)),
            ("ovrRating".to_string(), Value::Integer(ovr)),
        ]
        .into_iter()
        .collect()
    }

    fn teams(batch: &[(i64, i64)]) -> Vec<SnapshotEvent> {
        SnapshotEvent::batch("17", "TEAMS", batch.iter().map(|(id, ovr)| team(*id, *ovr)))
    }

    #[tokio::test]
    async fn identical_event_updates_timestamp_without_history() {
        let (_, events) = store();
        events.append_events(teams(&[(1, 80)]), id_field("teamId")).await.unwrap();
        let first = events.get_event("17", "TEAMS", "1").await.unwrap().unwrap();

        events.append_events(teams(&[(1, 80)]), id_field("teamId")).await.unwrap();
        let second = events.get_event("17", "TEAMS", "1").await.unwrap().unwrap();

        assert!(second.timestamp > first.timestamp);
        assert!(events.history("17", "TEAMS", "1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_field_writes_one_history_record() {
        let (_, events) = store();
        events.append_events(teams(&[(1, 5)]), id_field("teamId")).await.unwrap();
        events.append_events(teams(&[(1, 7)]), id_field("teamId")).await.unwrap();

        let history = events.history("17", "TEAMS", "1").await.unwrap();
        assert_eq!(history.len(), 1);
        let change = &history[0].changes["ovrRating"];
        assert_eq!(change.old_value, Some(Value::Integer(5)));
        assert_eq!(change.new_value, Some(Value::Integer(7)));
        assert_eq!(history[0].changes.len(), 1);
        assert_eq!(events.stats().snapshot().history_records, 1);
    }

    #[tokio::test]
    async fn repeated_id_in_one_batch_diffs_against_staged_value() {
        let (docs, events) = store();
        events
            .append_events(teams(&[(1, 5), (1, 6)]), id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(docs.commit_count(), 1);
        assert_eq!(events.history("17", "TEAMS", "1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let (docs, events) = store();
        docs.fail_next_commits(2);
        events.append_events(teams(&[(1, 80)]), id_field("teamId")).await.unwrap();
        assert_eq!(docs.commit_count(), 1);
        assert_eq!(events.stats().snapshot().commit_retries, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_abandon_without_notifying() {
        let (docs, events) = store();
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        events.registry().on("TEAMS", move |_| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Ok(())
            }
        });

        docs.fail_next_commits(3);
        let err = events
            .append_events(teams(&[(1, 80)]), id_field("teamId"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CommitAbandoned { attempts: 3, .. }));
        assert_eq!(*notified.lock(), 0);
        assert!(docs.is_empty());
        assert_eq!(events.stats().snapshot().commits_abandoned, 1);
    }

    #[tokio::test]
    async fn missing_id_is_rejected_before_writing() {
        let (docs, events) = store();
        let err = events
            .append_events(teams(&[(1, 80)]), id_field("rosterId"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidEvent(_)));
        assert_eq!(docs.commit_count(), 0);
    }

    #[tokio::test]
    async fn listeners_receive_committed_events_grouped_by_type() {
        let (_, events) = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.registry().on("SCHEDULE", move |batch: Vec<StoredEvent>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(batch.len());
                Ok(())
            }
        });

        let mut batch = teams(&[(1, 80)]);
        batch.extend(SnapshotEvent::batch(
            "17",
            "SCHEDULE",
            [
                Value::map([("scheduleId", Value::Integer(1))]),
                Value::map([("scheduleId", Value::Integer(2))]),
            ]
            .into_iter()
            .filter_map(|v| v.as_map().cloned()),
        ));
        let id_fn = |doc: &Document| {
            doc.get("teamId")
                .or_else(|| doc.get("scheduleId"))
                .and_then(Value::to_key_string)
        };
        events.append_events(batch, id_fn).await.unwrap();
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let (_, events) = store();
        let schedule = |id: i64, week: i64| -> Document {
            [
                ("scheduleId".to_string(), Value::Integer(id)),
                ("weekIndex".to_string(), Value::Integer(week)),
            ]
            .into_iter()
            .collect()
        };
        let id_fn = id_field("scheduleId");
        let first = events
            .append_events(SnapshotEvent::batch("17", "SCHEDULE", [schedule(1, 5)]), &id_fn)
            .await
            .unwrap();
        let cursor = first[0].timestamp;
        events
            .append_events(
                SnapshotEvent::batch("17", "SCHEDULE", (2..20).map(|id| schedule(id, if id % 2 == 0 { 5 } else { 6 }))),
                &id_fn,
            )
            .await
            .unwrap();

        let result = events
            .query_events(
                "17",
                "SCHEDULE",
                &EventQuery::new().after(cursor).filter("weekIndex", 5i64).limit(10),
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 9);
        assert!(result.iter().all(|e| e.get("weekIndex") == Some(&Value::Integer(5))));
        assert!(result.iter().all(|e| e.timestamp > cursor));
        assert!(result.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(result[0].id, "18");
    }

    #[tokio::test]
    async fn digest_gate_rewrites_only_changed_teams() {
        let (docs, events) = store();
        let batch = |b: i64| vec![team(1, 80), team(2, b), team(3, 90)];

        let first = events
            .append_changed("17", "TEAMS", batch(75), id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(first, IngestReport { total: 3, changed: 3, committed: 3 });
        docs.take_write_log();

        let second = events
            .append_changed("17", "TEAMS", batch(78), id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(second, IngestReport { total: 3, changed: 1, committed: 1 });

        let written: Vec<String> = docs.take_write_log().iter().map(ToString::to_string).collect();
        assert!(written.contains(&"league_data/17/TEAMS/2".to_string()));
        assert!(!written.iter().any(|p| p.ends_with("TEAMS/1") || p.ends_with("TEAMS/3")));

        let third = events
            .append_changed("17", "TEAMS", batch(78), id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(third.committed, 0);
    }

    #[tokio::test]
    async fn failed_ingest_keeps_previous_tree() {
        let (docs, events) = store();
        docs.fail_next_commits(3);
        assert!(events
            .append_changed("17", "TEAMS", vec![team(1, 80)], id_field("teamId"))
            .await
            .is_err());
        let retry = events
            .append_changed("17", "TEAMS", vec![team(1, 80)], id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(retry.committed, 1);
    }

    #[tokio::test]
    async fn digest_tree_commits_with_snapshots() {
        let (docs, events) = store();
        events
            .append_changed("17", "TEAMS", vec![team(1, 80), team(2, 75)], id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(docs.commit_count(), 1);
        let written: Vec<String> = docs.take_write_log().iter().map(ToString::to_string).collect();
        assert!(written.contains(&"league_data/17/digests/TEAMS".to_string()));
        assert!(written.contains(&"league_data/17/TEAMS/1".to_string()));
    }

    #[tokio::test]
    async fn removal_stores_tree_without_notifying() {
        let (docs, events) = store();
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        events
            .append_changed("17", "TEAMS", vec![team(1, 80), team(2, 75)], id_field("teamId"))
            .await
            .unwrap();
        events.registry().on("TEAMS", move |_| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Ok(())
            }
        });
        docs.take_write_log();

        let report = events
            .append_changed("17", "TEAMS", vec![team(1, 80)], id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(report.committed, 0);
        assert_eq!(
            docs.take_write_log().iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["league_data/17/digests/TEAMS".to_string()]
        );
        assert_eq!(*notified.lock(), 0);

        let again = events
            .append_changed("17", "TEAMS", vec![team(1, 80)], id_field("teamId"))
            .await
            .unwrap();
        assert_eq!(again.committed, 0);
        assert!(docs.take_write_log().is_empty());
    }

    /// Accepts reads but rejects every commit as corrupt.
    #[derive(Default)]
    struct RejectingStore {
        inner: InMemoryDocumentStore,
        commits: Mutex<u32>,
    }

    impl DocumentStore for RejectingStore {
        async fn get(&self, path: &DocPath) -> leaguesync_storage::StorageResult<Option<Document>> {
            self.inner.get(path).await
        }

        async fn set(
            &self,
            path: &DocPath,
            document: Document,
            mode: SetMode,
        ) -> leaguesync_storage::StorageResult<()> {
            self.inner.set(path, document, mode).await
        }

        async fn update(
            &self,
            path: &DocPath,
            fields: Vec<(String, leaguesync_storage::FieldUpdate)>,
        ) -> leaguesync_storage::StorageResult<()> {
            self.inner.update(path, fields).await
        }

        async fn commit(&self, _batch: WriteBatch) -> leaguesync_storage::StorageResult<()> {
            *self.commits.lock() += 1;
            Err(StorageError::Corrupted("checksum mismatch".into()))
        }

        async fn query(
            &self,
            collection: &DocPath,
            query: &RangeQuery,
        ) -> leaguesync_storage::StorageResult<Vec<(DocPath, Document)>> {
            self.inner.query(collection, query).await
        }
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let docs = Arc::new(RejectingStore::default());
        let events = EventStore::new(Arc::clone(&docs), Arc::new(NotifierRegistry::new()))
            .with_config(StoreConfig::new().with_retry(crate::RetryConfig::new(5, Duration::from_millis(1))));

        let err = events
            .append_events(teams(&[(1, 80)]), id_field("teamId"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(StorageError::Corrupted(_))));
        assert_eq!(*docs.commits.lock(), 1);
        let stats = events.stats().snapshot();
        assert_eq!(stats.commit_retries, 0);
        assert_eq!(stats.commits_abandoned, 0);
        assert_eq!(stats.events_appended, 0);
    }

    #[test]
    fn digest_collection_is_reserved() {
        assert!(event_collection("17", DIGEST_COLLECTION).is_err());
        assert_eq!(
            snapshot_path("17", "TEAMS", "4").unwrap().to_string(),
            "league_data/17/TEAMS/4"
        );
    }
}
