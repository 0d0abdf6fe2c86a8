//! Configuration for the event store, hashing and caches.

use leaguesync_codec::Document;
use std::collections::BTreeSet;
use std::time::Duration;

/// Fields stripped before leaf hashing by default.
///
/// `timestamp` and `id` are written by the store itself; `lastUpdated`
/// is the producer's fetch stamp and changes on every poll.
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &["timestamp", "id", "lastUpdated"];

/// Fields the event store writes onto every stored snapshot.
pub const STORE_OWNED_FIELDS: &[&str] = &["timestamp", "id"];

/// Selects which top-level fields of an entity participate in hashing or
/// history diffing.
///
/// A field participates when it is in the allow-list (or there is none)
/// and it is not in the deny-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    /// If set, only these fields participate.
    pub allow: Option<BTreeSet<String>>,
    /// These fields never participate.
    pub deny: BTreeSet<String>,
}

impl FieldPolicy {
    /// A policy that lets every field through.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// The default hashing policy: everything except [`DEFAULT_VOLATILE_FIELDS`].
    #[must_use]
    pub fn volatile() -> Self {
        Self::all().with_denied(DEFAULT_VOLATILE_FIELDS.iter().copied())
    }

    /// Restricts participation to the given fields.
    #[must_use]
    pub fn with_allowed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Adds fields to the deny-list.
    #[must_use]
    pub fn with_denied<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Returns true if `field` participates.
    pub fn permits(&self, field: &str) -> bool {
        if self.deny.contains(field) {
            return false;
        }
        self.allow.as_ref().map_or(true, |allow| allow.contains(field))
    }

    /// Returns a copy of `doc` holding only participating fields.
    pub fn apply(&self, doc: &Document) -> Document {
        doc.iter()
            .filter(|(field, _)| self.permits(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// Commit retry behavior.
///
/// Retries use a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt with no retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Sets the attempt count (at least one).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Event store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Commit retry behavior.
    pub retry: RetryConfig,
    /// Fields that participate in history diffing.
    pub history_fields: FieldPolicy,
    /// Fields that participate in leaf hashing for digest-gated ingestion.
    pub hash_fields: FieldPolicy,
}

impl StoreConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            history_fields: FieldPolicy::all(),
            hash_fields: FieldPolicy::volatile(),
        }
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the history diffing policy.
    #[must_use]
    pub fn with_history_fields(mut self, policy: FieldPolicy) -> Self {
        self.history_fields = policy;
        self
    }

    /// Sets the leaf hashing policy.
    #[must_use]
    pub fn with_hash_fields(mut self, policy: FieldPolicy) -> Self {
        self.hash_fields = policy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// View cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays valid after it was written.
    pub ttl: Duration,
    /// Maximum number of cached views.
    pub capacity: usize,
    /// Number of shards for concurrent access.
    pub shards: usize,
}

impl CacheConfig {
    /// Creates a cache configuration with the given expiry and default
    /// bounds.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            capacity: 4096,
            shards: 8,
        }
    }

    /// Sets the expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the maximum number of cached views.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the shard count.
    #[must_use]
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leaguesync_codec::Value;

    #[test]
    fn volatile_policy_strips_bookkeeping() {
        let policy = FieldPolicy::volatile();
        let doc: Document = [
            ("ovrRating".to_string(), Value::Integer(80)),
            ("lastUpdated".to_string(), Value::Integer(12)),
            ("id".to_string(), Value::from("4")),
        ]
        .into_iter()
        .collect();
        let kept = policy.apply(&doc);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("ovrRating"));
    }

    #[test]
    fn deny_wins_over_allow() {
        let policy = FieldPolicy::all()
            .with_allowed(["a", "b"])
            .with_denied(["b"]);
        assert!(policy.permits("a"));
        assert!(!policy.permits("b"));
        assert!(!policy.permits("c"));
    }

    #[test]
    fn retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 10);
        assert_eq!(retry.delay, Duration::from_secs(1));
        assert_eq!(RetryConfig::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::new();
        assert!(!config.hash_fields.permits("lastUpdated"));
        assert!(config.history_fields.permits("lastUpdated"));
    }

    #[test]
    fn cache_config_builders() {
        let config = CacheConfig::default().with_capacity(128).with_shards(2);
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.capacity, 128);
        assert_eq!(config.shards, 2);
    }
}
