//! # LeagueSync Core
//!
//! Event-sourced synchronization and materialized views for league data.
//!
//! Periodic full snapshots from an external producer are turned into an
//! append-only change log with field-level history, and served to
//! consumers through incrementally updated, cached views.
//!
//! ## Components
//!
//! - [`DigestTree`] - hashes a batch of entities and diffs it against the
//!   previous batch so unchanged entities are not rewritten
//! - [`EventStore`] - stores the current snapshot per entity, records a
//!   [`HistoryRecord`] when scalar fields change, commits each call as one
//!   retried batch and then notifies listeners
//! - [`NotifierRegistry`] - best-effort, in-process fan-out of committed
//!   events by type
//! - [`view`] - ephemeral, cache-only and durable-cache read models
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use leaguesync_core::{id_field, EventStore, NotifierRegistry};
//! use leaguesync_storage::InMemoryDocumentStore;
//! # async fn demo(teams: Vec<leaguesync_codec::Document>) -> leaguesync_core::CoreResult<()> {
//!
//! let registry = Arc::new(NotifierRegistry::new());
//! let events = EventStore::new(Arc::new(InMemoryDocumentStore::new()), Arc::clone(&registry));
//!
//! let report = events.append_changed("17", "TEAMS", teams, id_field("teamId")).await?;
//! println!("{} of {} teams changed", report.changed, report.total);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod clock;
mod config;
mod digest;
mod error;
mod event;
mod history;
mod notifier;
mod stats;
mod store;
pub mod view;

pub use cache::TtlCache;
pub use clock::{Clock, SystemClock};
pub use config::{
    CacheConfig, FieldPolicy, RetryConfig, StoreConfig, DEFAULT_VOLATILE_FIELDS, STORE_OWNED_FIELDS,
};
pub use digest::{
    id_field, leaf_hash, DigestNode, DigestTree, DigestTreeStore, Hasher, Sha256Hasher,
    DIGEST_COLLECTION,
};
pub use error::{CoreError, CoreResult};
pub use event::{FieldChange, HistoryRecord, SnapshotEvent, StoredEvent};
pub use history::diff_fields;
pub use notifier::{Listener, ListenerFuture, NotifierRegistry, NotifyOutcome};
pub use stats::{StatsSnapshot, SyncStats};
pub use store::{
    event_collection, snapshot_path, EventQuery, EventStore, IngestReport, HISTORY_COLLECTION,
    ID_FIELD, ROOT_COLLECTION, TIMESTAMP_FIELD,
};
pub use view::{
    CacheOnlyView, CachedView, DurableView, EventsByType, MissingViewPolicy, ReplayView, UpdateFn,
    View,
};
