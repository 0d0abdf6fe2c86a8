//! In-process fan-out of committed events to listeners.
//!
//! The registry maps an event type to the listeners interested in it.
//! After a batch commits, the event store hands it to
//! [`NotifierRegistry::notify`], which groups events by type and calls
//! every listener for that type with the whole sub-batch.
//!
//! Delivery is best effort: listeners registered after an event was
//! emitted never see it, and a failing listener is logged and skipped
//! without affecting its siblings or the caller.

use crate::error::CoreResult;
use crate::event::StoredEvent;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// The future a listener returns.
pub type ListenerFuture = Pin<Box<dyn Future<Output = CoreResult<()>> + Send>>;

/// A registered listener.
pub type Listener = Arc<dyn Fn(Vec<StoredEvent>) -> ListenerFuture + Send + Sync>;

/// Outcome of one notification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// Listener calls made.
    pub invoked: u64,
    /// Listener calls that returned an error.
    pub failed: u64,
}

/// Map from event type to listeners.
///
/// Construct one per process at startup and share it (behind an `Arc`)
/// between the event store and the views that subscribe to it.
#[derive(Default)]
pub struct NotifierRegistry {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl NotifierRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event_type`.
    ///
    /// The listener is placed ahead of those already registered for the
    /// type. Registering the same function twice makes it run twice.
    pub fn on<F, Fut>(&self, event_type: impl Into<String>, listener: F)
    where
        F: Fn(Vec<StoredEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CoreResult<()>> + Send + 'static,
    {
        let listener: Listener = Arc::new(move |events| Box::pin(listener(events)));
        let event_type = event_type.into();
        debug!(event_type = %event_type, "registering listener");
        self.listeners
            .write()
            .entry(event_type)
            .or_default()
            .insert(0, listener);
    }

    /// Number of listeners registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.read().get(event_type).map_or(0, Vec::len)
    }

    /// Delivers committed events to their listeners.
    ///
    /// Events are grouped by type; each listener for a type receives that
    /// type's whole sub-batch. Listener errors are logged and counted.
    pub async fn notify(&self, events: &[StoredEvent]) -> NotifyOutcome {
        let mut by_type: BTreeMap<&str, Vec<StoredEvent>> = BTreeMap::new();
        for event in events {
            by_type
                .entry(event.event_type.as_str())
                .or_default()
                .push(event.clone());
        }

        let mut outcome = NotifyOutcome::default();
        for (event_type, batch) in by_type {
            let listeners = match self.listeners.read().get(event_type) {
                Some(listeners) => listeners.clone(),
                None => continue,
            };
            for listener in listeners {
                outcome.invoked += 1;
                if let Err(e) = listener(batch.clone()).await {
                    outcome.failed += 1;
                    warn!(event_type, events = batch.len(), error = %e, "listener failed");
                }
            }
        }
        outcome
    }
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<String, usize> = self
            .listeners
            .read()
            .iter()
            .map(|(event_type, listeners)| (event_type.clone(), listeners.len()))
            .collect();
        f.debug_struct("NotifierRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use chrono::Utc;
    use leaguesync_codec::Document;
    use parking_lot::Mutex;

    fn event(event_type: &str, id: &str) -> StoredEvent {
        StoredEvent {
            subject: "17".into(),
            event_type: event_type.into(),
            id: id.into(),
            timestamp: Utc::now(),
            fields: Document::new(),
        }
    }

    #[tokio::test]
    async fn listeners_get_their_type_only() {
        let registry = NotifierRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.on("TEAMS", move |events: Vec<StoredEvent>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().extend(events.into_iter().map(|e| e.id));
                Ok(())
            }
        });

        let outcome = registry
            .notify(&[event("TEAMS", "a"), event("SCHEDULE", "x"), event("TEAMS", "b")])
            .await;
        assert_eq!(*seen.lock(), vec!["a", "b"]);
        assert_eq!(outcome, NotifyOutcome { invoked: 1, failed: 0 });
    }

    #[tokio::test]
    async fn later_registrations_run_first_and_duplicates_are_kept() {
        let registry = NotifierRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "second"] {
            let order = Arc::clone(&order);
            registry.on("TEAMS", move |_| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().push(name);
                    Ok(())
                }
            });
        }
        assert_eq!(registry.listener_count("TEAMS"), 3);
        registry.notify(&[event("TEAMS", "a")]).await;
        assert_eq!(*order.lock(), vec!["second", "second", "first"]);
    }

    #[tokio::test]
    async fn failing_listener_does_not_stop_siblings() {
        let registry = NotifierRegistry::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        registry.on("TEAMS", move |_| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Ok(())
            }
        });
        registry.on("TEAMS", |_| async { Err(CoreError::listener("boom")) });

        let outcome = registry.notify(&[event("TEAMS", "a")]).await;
        assert_eq!(*calls.lock(), 1);
        assert_eq!(outcome, NotifyOutcome { invoked: 2, failed: 1 });
    }

    #[tokio::test]
    async fn no_listeners_is_a_no_op() {
        let registry = NotifierRegistry::new();
        assert_eq!(registry.notify(&[event("TEAMS", "a")]).await, NotifyOutcome::default());
    }
}
