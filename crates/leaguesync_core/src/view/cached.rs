//! Cached views with incremental updates.

use super::{group_by_type, EventsByType, UpdateFn, View};
use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::error::CoreResult;
use crate::event::StoredEvent;
use crate::notifier::NotifierRegistry;
use crate::stats::SyncStats;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What to do when events arrive for a key that has no view yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingViewPolicy {
    /// Ignore the events; the view is built on the next `create_view`.
    #[default]
    Skip,
    /// Recompute the view from its source. The events are already
    /// committed, so the recompute includes them.
    Materialize,
}

/// Maps an event to the view key it affects.
pub type KeyFn = Arc<dyn Fn(&StoredEvent) -> String + Send + Sync>;

/// A second tier consulted on cache misses and written after changes.
///
/// Errors returned here never reach view callers: [`CachedView`] logs
/// them, treats a failed load as a miss and drops a failed store.
pub trait ViewBacking<T>: Send + Sync + 'static {
    /// False for tiers that never hold anything.
    const ENABLED: bool = true;

    /// Loads a previously stored view.
    fn load(&self, view: &str, key: &str) -> impl Future<Output = CoreResult<Option<T>>> + Send;

    /// Stores a view.
    fn store(&self, view: &str, key: &str, value: &T) -> impl Future<Output = CoreResult<()>> + Send;
}

/// No second tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBacking;

impl<T: Send + Sync> ViewBacking<T> for NoBacking {
    const ENABLED: bool = false;

    async fn load(&self, _view: &str, _key: &str) -> CoreResult<Option<T>> {
        Ok(None)
    }

    async fn store(&self, _view: &str, _key: &str, _value: &T) -> CoreResult<()> {
        Ok(())
    }
}

/// A view wrapped in a TTL cache, optionally backed by a second tier.
///
/// [`create_view`](View::create_view) serves from the cache, then the
/// backing tier, and only then recomputes through the wrapped view.
/// After [`listen`](Self::listen), committed events for a cached key are
/// folded into the cached value with the update function instead of
/// triggering a recompute.
///
/// Clones share the cache and the backing tier.
pub struct CachedView<V: View, B = NoBacking> {
    inner: Arc<V>,
    backing: Arc<B>,
    cache: Arc<TtlCache<String, V::Output>>,
    update: UpdateFn<V::Output>,
    key_fn: KeyFn,
    missing: MissingViewPolicy,
    stats: Arc<SyncStats>,
}

/// A view cached in memory only.
pub type CacheOnlyView<V> = CachedView<V, NoBacking>;

impl<V: View, B> Clone for CachedView<V, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            backing: Arc::clone(&self.backing),
            cache: Arc::clone(&self.cache),
            update: Arc::clone(&self.update),
            key_fn: Arc::clone(&self.key_fn),
            missing: self.missing,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<V: View> CachedView<V, NoBacking> {
    /// Wraps `inner` in an in-memory cache.
    pub fn new(inner: V, update: UpdateFn<V::Output>, config: &CacheConfig) -> Self {
        Self::with_backing(inner, NoBacking, update, config)
    }
}

impl<V: View, B: ViewBacking<V::Output>> CachedView<V, B> {
    /// Wraps `inner` in an in-memory cache over `backing`.
    pub fn with_backing(inner: V, backing: B, update: UpdateFn<V::Output>, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            backing: Arc::new(backing),
            cache: Arc::new(TtlCache::from_config(config)),
            update,
            key_fn: Arc::new(|event: &StoredEvent| event.subject.clone()),
            missing: MissingViewPolicy::default(),
            stats: Arc::new(SyncStats::new()),
        }
    }

    /// Sets how events are mapped to view keys. Defaults to the subject.
    #[must_use]
    pub fn with_key_fn(mut self, key_fn: impl Fn(&StoredEvent) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Sets the policy for events on keys without a view.
    #[must_use]
    pub fn with_missing_policy(mut self, policy: MissingViewPolicy) -> Self {
        self.missing = policy;
        self
    }

    /// Shares a statistics sink.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<SyncStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Statistics.
    pub fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    /// The wrapped view.
    pub fn inner(&self) -> &V {
        &self.inner
    }

    /// The backing tier.
    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Returns the cached value for `key` without loading anything.
    pub fn cached(&self, key: &str) -> Option<V::Output> {
        self.cache.get(&key.to_string())
    }

    /// Drops the cached value for `key`.
    pub fn invalidate(&self, key: &str) {
        self.cache.remove(&key.to_string());
    }

    /// Subscribes to `event_types` so committed events update cached
    /// views incrementally.
    pub fn listen<I, E>(&self, registry: &NotifierRegistry, event_types: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        for event_type in event_types {
            let event_type = event_type.into();
            debug!(view = %self.inner.name(), event_type = %event_type, "view listening");
            let this = self.clone();
            registry.on(event_type, move |events: Vec<StoredEvent>| {
                let this = this.clone();
                async move { this.apply_events(events).await }
            });
        }
    }

    /// Applies a batch of committed events to the affected cached views.
    ///
    /// # Errors
    ///
    /// Returns an error only if a [`MissingViewPolicy::Materialize`]
    /// recompute fails.
    pub async fn apply_events(&self, events: Vec<StoredEvent>) -> CoreResult<()> {
        let mut by_key: BTreeMap<String, Vec<StoredEvent>> = BTreeMap::new();
        for event in events {
            by_key.entry((self.key_fn)(&event)).or_default().push(event);
        }

        for (key, events) in by_key {
            let Some(current) = self.current(&key).await else {
                match self.missing {
                    MissingViewPolicy::Skip => {
                        trace!(view = %self.inner.name(), key = %key, "no view to update");
                        self.stats.record_updates_skipped(1);
                    }
                    MissingViewPolicy::Materialize => {
                        self.recompute(&key).await?;
                    }
                }
                continue;
            };
            let grouped: EventsByType = group_by_type(events);
            let next = (self.update)(&grouped, current);
            self.stats.record_view_updates(1);
            self.cache.insert(key.clone(), next.clone());
            self.store_backing(&key, &next).await;
        }
        Ok(())
    }

    async fn current(&self, key: &str) -> Option<V::Output> {
        if let Some(value) = self.cache.get(&key.to_string()) {
            return Some(value);
        }
        let value = self.load_backing(key).await?;
        self.cache.insert(key.to_string(), value.clone());
        Some(value)
    }

    async fn load_backing(&self, key: &str) -> Option<V::Output> {
        if !<B as ViewBacking<V::Output>>::ENABLED {
            return None;
        }
        match self.backing.load(self.inner.name(), key).await {
            Ok(Some(value)) => {
                self.stats.record_durable_reads(1);
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(view = %self.inner.name(), key, error = %e, "durable read failed, recomputing");
                self.stats.record_durable_failures(1);
                None
            }
        }
    }

    async fn store_backing(&self, key: &str, value: &V::Output) {
        if !<B as ViewBacking<V::Output>>::ENABLED {
            return;
        }
        match self.backing.store(self.inner.name(), key, value).await {
            Ok(()) => self.stats.record_durable_writes(1),
            Err(e) => {
                warn!(view = %self.inner.name(), key, error = %e, "durable write failed");
                self.stats.record_durable_failures(1);
            }
        }
    }

    async fn recompute(&self, key: &str) -> CoreResult<V::Output> {
        let value = self.inner.create_view(key).await?;
        self.stats.record_view_recomputes(1);
        self.cache.insert(key.to_string(), value.clone());
        self.store_backing(key, &value).await;
        Ok(value)
    }
}

impl<V: View, B: ViewBacking<V::Output>> View for CachedView<V, B> {
    type Output = V::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create_view(&self, key: &str) -> CoreResult<V::Output> {
        if let Some(value) = self.cache.get(&key.to_string()) {
            self.stats.record_cache_hits(1);
            return Ok(value);
        }
        self.stats.record_cache_misses(1);
        if let Some(value) = self.load_backing(key).await {
            self.cache.insert(key.to_string(), value.clone());
            return Ok(value);
        }
        self.recompute(key).await
    }
}

impl<V: View, B> std::fmt::Debug for CachedView<V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedView")
            .field("view", &self.inner.name())
            .field("cache", &self.cache)
            .field("missing", &self.missing)
            .finish_non_exhaustive()
    }
}
