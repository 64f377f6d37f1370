// ── Reactive state streams ──
//
// Subscription types for consuming published device state.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::DeviceState;

/// A subscription to the published device state.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`. Only
/// successful refreshes publish; failures never wake a subscriber.
pub struct StateStream {
    current: Arc<DeviceState>,
    receiver: watch::Receiver<Arc<DeviceState>>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<DeviceState>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot as of creation or the last `changed()`.
    pub fn current(&self) -> &Arc<DeviceState> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<DeviceState> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish, returning the new snapshot.
    /// Returns `None` once the coordinator has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<DeviceState>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream`. Yields the latest snapshot first, then one
    /// item per publish.
    pub fn into_stream(self) -> StateWatchStream {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StateWatchStream {
    inner: WatchStream<Arc<DeviceState>>,
}

impl Stream for StateWatchStream {
    type Item = Arc<DeviceState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
