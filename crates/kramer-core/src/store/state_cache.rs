// ── Last-good state cache ──
//
// The `watch` channel holds the one copy of the snapshot: readers clone
// its `Arc`, and each successful refresh swaps the whole value and wakes
// subscribers. Failed refreshes never touch it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::DeviceState;
use crate::stream::StateStream;

/// Holds the last successfully published [`DeviceState`].
///
/// Starts out holding the disconnected default.
pub struct StateCache {
    snapshot: watch::Sender<Arc<DeviceState>>,
    last_refreshed: watch::Sender<Option<DateTime<Utc>>>,
}

impl StateCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(DeviceState::disconnected()));
        let (last_refreshed, _) = watch::channel(None);

        Self {
            snapshot,
            last_refreshed,
        }
    }

    /// The current snapshot (cheap `Arc` clone).
    pub fn load(&self) -> Arc<DeviceState> {
        self.snapshot.borrow().clone()
    }

    /// Replace the snapshot and notify subscribers.
    pub(crate) fn publish(&self, state: Arc<DeviceState>) {
        self.snapshot.send_replace(state);
        self.last_refreshed.send_replace(Some(Utc::now()));
    }

    pub fn subscribe(&self) -> StateStream {
        StateStream::new(self.snapshot.subscribe())
    }

    /// When the snapshot was last replaced, or `None` if it never was.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed.borrow()
    }

    /// How long ago the snapshot was last replaced.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refreshed().map(|t| Utc::now() - t)
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionState;

    fn connected(inputs: u32) -> Arc<DeviceState> {
        Arc::new(DeviceState {
            input_count: inputs,
            source_list: DeviceState::source_list_for(inputs),
            selected_source: "1".into(),
            connection_state: ConnectionState::Connected,
        })
    }

    #[test]
    fn starts_disconnected_and_unrefreshed() {
        let cache = StateCache::new();
        assert_eq!(*cache.load(), DeviceState::disconnected());
        assert!(cache.last_refreshed().is_none());
        assert!(cache.data_age().is_none());
    }

    #[test]
    fn publish_swaps_the_snapshot() {
        let cache = StateCache::new();
        let state = connected(4);

        cache.publish(Arc::clone(&state));

        assert!(Arc::ptr_eq(&cache.load(), &state));
        assert!(cache.last_refreshed().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_published_state() {
        let cache = StateCache::new();
        let mut stream = cache.subscribe();
        assert!(!stream.current().is_connected());

        let state = connected(2);
        cache.publish(Arc::clone(&state));

        let next = stream.changed().await.unwrap();
        assert!(Arc::ptr_eq(&next, &state));
        assert!(Arc::ptr_eq(stream.current(), &cache.load()));
    }
}
