//! In-memory cache with a fixed expiry per entry.
//!
//! Storage is a sharded [`foyer::Cache`] bounded by entry count; once it
//! is full, inserts evict older entries. Each value carries its own
//! expiry stamp, checked on every read.

use crate::config::CacheConfig;
use foyer::{Cache, CacheBuilder};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A bounded key-value cache whose entries expire a fixed time after
/// insertion.
///
/// Entries expire independently; reading an entry does not extend it.
/// An expired entry is dropped when it is next read, or earlier if
/// capacity pressure evicts it.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    ttl: Duration,
    capacity: usize,
    cache: Cache<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `capacity` entries in `shards`
    /// shards.
    pub fn new(ttl: Duration, capacity: usize, shards: usize) -> Self {
        let capacity = capacity.max(1);
        let cache = CacheBuilder::new(capacity)
            .with_shards(shards.clamp(1, capacity))
            .build();
        Self { ttl, capacity, cache }
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.capacity, config.shards)
    }

    /// The expiry applied to new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Maximum number of entries held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a live entry.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Inserts or replaces an entry, restarting its expiry.
    ///
    /// With a zero expiry nothing is stored.
    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Removes an entry.
    pub fn remove(&self, key: &K) {
        self.cache.remove(key);
    }

    /// Number of entries held, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.cache.usage()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let entry = self.cache.get(key)?;
        if entry.value().is_live(now) {
            return Some(entry.value().value.clone());
        }
        drop(entry);
        self.cache.remove(key);
        None
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        self.cache.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("entries", &self.cache.usage())
            .finish()
    }
}
