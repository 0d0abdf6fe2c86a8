//! Views recomputed by replaying stored events.

use super::{EventsByType, UpdateFn, View};
use crate::error::{CoreError, CoreResult};
use crate::store::EventStore;
use leaguesync_storage::DocumentStore;
use std::sync::Arc;
use tracing::debug;

/// A view rebuilt from scratch on every request.
///
/// Reads every stored event of the configured types for the key (the
/// subject) and folds them, oldest first, through the update function
/// starting from a seed value.
pub struct ReplayView<S, T> {
    name: String,
    events: Arc<EventStore<S>>,
    event_types: Vec<String>,
    seed: Arc<dyn Fn(&str) -> T + Send + Sync>,
    update: UpdateFn<T>,
}

impl<S, T> ReplayView<S, T>
where
    S: DocumentStore + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a replay view over `event_types`.
    pub fn new<I, E>(
        name: impl Into<String>,
        events: Arc<EventStore<S>>,
        event_types: I,
        seed: impl Fn(&str) -> T + Send + Sync + 'static,
        update: UpdateFn<T>,
    ) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        Self {
            name: name.into(),
            events,
            event_types: event_types.into_iter().map(Into::into).collect(),
            seed: Arc::new(seed),
            update,
        }
    }

    /// The update function, for sharing with a cached wrapper.
    pub fn update_fn(&self) -> UpdateFn<T> {
        Arc::clone(&self.update)
    }

    /// The event types this view consumes.
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }
}

impl<S, T> View for ReplayView<S, T>
where
    S: DocumentStore + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create_view(&self, key: &str) -> CoreResult<T> {
        let mut all = Vec::new();
        for event_type in &self.event_types {
            let events = self
                .events
                .scan(key, event_type)
                .await
                .map_err(|e| CoreError::view_failed(&self.name, e.to_string()))?;
            all.extend(events);
        }
        all.sort_by_key(|event| event.timestamp);
        debug!(view = %self.name, key, events = all.len(), "replaying view");

        let mut state = (self.seed)(key);
        for event in all {
            let mut single = EventsByType::new();
            single.insert(event.event_type.clone(), vec![event]);
            state = (self.update)(&single, state);
        }
        Ok(state)
    }
}
