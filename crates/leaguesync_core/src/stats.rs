//! Synchronization statistics.
//!
//! All counters are atomic and monotonically increasing. Take a
//! [`StatsSnapshot`] to read a consistent-enough view for logging or
//! tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the event store and the view layer.
#[derive(Debug, Default)]
pub struct SyncStats {
    // Event store
    events_appended: AtomicU64,
    history_records: AtomicU64,
    commits: AtomicU64,
    commit_retries: AtomicU64,
    commits_abandoned: AtomicU64,
    entities_skipped: AtomicU64,

    // Notifier
    listener_invocations: AtomicU64,
    listener_failures: AtomicU64,

    // Views
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    view_recomputes: AtomicU64,
    view_updates: AtomicU64,
    updates_skipped: AtomicU64,
    durable_reads: AtomicU64,
    durable_writes: AtomicU64,
    durable_failures: AtomicU64,
}

macro_rules! counters {
    ($($field:ident => $record:ident),* $(,)?) => {
        impl SyncStats {
            $(
                #[doc = concat!("Adds to `", stringify!($field), "`.")]
                pub fn $record(&self, n: u64) {
                    self.$field.fetch_add(n, Ordering::Relaxed);
                }
            )*

            /// Takes a snapshot of the current values.
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }

        /// Point-in-time copy of [`SyncStats`].
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        #[allow(missing_docs)]
        pub struct StatsSnapshot {
            $(pub $field: u64,)*
        }
    };
}

counters! {
    events_appended => record_events_appended,
    history_records => record_history_records,
    commits => record_commits,
    commit_retries => record_commit_retries,
    commits_abandoned => record_commits_abandoned,
    entities_skipped => record_entities_skipped,
    listener_invocations => record_listener_invocations,
    listener_failures => record_listener_failures,
    cache_hits => record_cache_hits,
    cache_misses => record_cache_misses,
    view_recomputes => record_view_recomputes,
    view_updates => record_view_updates,
    updates_skipped => record_updates_skipped,
    durable_reads => record_durable_reads,
    durable_writes => record_durable_writes,
    durable_failures => record_durable_failures,
}

impl SyncStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = SyncStats::new();
        stats.record_commits(1);
        stats.record_commits(1);
        stats.record_events_appended(3);
        let snap = stats.snapshot();
        assert_eq!(snap.commits, 2);
        assert_eq!(snap.events_appended, 3);
        assert_eq!(snap.cache_hits, 0);
    }
}
