//! Materialized views.
//!
//! A view is a named, key-scoped read model derived from stored events.
//! Three variants build on each other:
//!
//! - an ephemeral view ([`View`] implementors such as [`ReplayView`])
//!   recomputes from scratch on every request
//! - [`CacheOnlyView`] keeps results in a [`TtlCache`](crate::TtlCache)
//!   and applies new events incrementally once subscribed via
//!   [`CachedView::listen`]
//! - [`DurableView`] additionally persists results to a
//!   [`BlobStore`](leaguesync_storage::BlobStore) and consults that copy
//!   before recomputing
//!
//! Incremental updates go through an [`UpdateFn`]. It must be a pure
//! function of the events and the current view so that replaying every
//! event of a key from scratch yields the same result.

mod cached;
mod durable;
mod replay;

pub use cached::{CacheOnlyView, CachedView, KeyFn, MissingViewPolicy, NoBacking, ViewBacking};
pub use durable::{DurableBacking, DurableView};
pub use replay::ReplayView;

use crate::error::CoreResult;
use crate::event::StoredEvent;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Events of one notification, keyed by event type.
pub type EventsByType = BTreeMap<String, Vec<StoredEvent>>;

/// Applies new events to a view: `update(events, current) -> next`.
///
/// Returns `current` unchanged for event types the view ignores.
pub type UpdateFn<T> = Arc<dyn Fn(&EventsByType, T) -> T + Send + Sync>;

/// A named read model computed per key.
pub trait View: Send + Sync + 'static {
    /// The materialized value.
    type Output: Clone + Send + Sync + 'static;

    /// The view's name, used in logs and durable paths.
    fn name(&self) -> &str;

    /// Returns the view for `key`.
    fn create_view(&self, key: &str) -> impl Future<Output = CoreResult<Self::Output>> + Send;
}

/// Groups events by type, keeping their order within each type.
pub fn group_by_type(events: impl IntoIterator<Item = StoredEvent>) -> EventsByType {
    let mut grouped = EventsByType::new();
    for event in events {
        grouped.entry(event.event_type.clone()).or_default().push(event);
    }
    grouped
}
