// ── Polling coordinator ──
//
// Serializes every refresh against one DeviceClient. Overlapping refresh
// requests attach to the refresh already in flight instead of starting a
// second one. Successful refreshes replace the published state; failures
// are reported but leave it alone, and never stop the timer.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use kramer_api::Connector;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::DeviceClient;
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, UpdateFailed};
use crate::model::DeviceState;
use crate::store::StateCache;
use crate::stream::StateStream;

/// Result of one refresh, shared by everyone who waited on it.
pub type RefreshOutcome = Result<Arc<DeviceState>, UpdateFailed>;

type Flight = Shared<BoxFuture<'static, RefreshOutcome>>;
type Listener = Arc<dyn Fn(&Arc<DeviceState>) + Send + Sync>;

// ── Observable types ─────────────────────────────────────────────

/// Whether a refresh is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Emitted after every refresh, successful or not.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    Published(Arc<DeviceState>),
    Failed(UpdateFailed),
}

/// Handle returned by [`PollingCoordinator::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ── PollingCoordinator ───────────────────────────────────────────

/// Owns the refresh timer and the single-flight guard for one device.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Background tasks hold a
/// clone, so call [`shutdown()`](Self::shutdown) to stop them.
pub struct PollingCoordinator<C: Connector> {
    inner: Arc<CoordinatorInner<C>>,
}

impl<C: Connector> Clone for PollingCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct InFlight {
    id: u64,
    future: Flight,
}

struct CoordinatorInner<C: Connector> {
    config: CoordinatorConfig,
    name: String,
    /// Only ever locked on the blocking pool.
    client: Arc<Mutex<DeviceClient<C>>>,
    cache: StateCache,
    events: broadcast::Sender<UpdateEvent>,
    flight: Mutex<Option<InFlight>>,
    next_flight: AtomicU64,
    last_error: Mutex<Option<UpdateFailed>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    started: AtomicBool,
    cancel: CancellationToken,
    task_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Connector> PollingCoordinator<C> {
    /// Create a coordinator around `client`. Does NOT refresh -- call
    /// [`start()`](Self::start) to run the first refresh and the timer.
    pub fn new(client: DeviceClient<C>, config: CoordinatorConfig) -> Self {
        let name = client.name().to_owned();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                name,
                client: Arc::new(Mutex::new(client)),
                cache: StateCache::new(),
                events,
                flight: Mutex::new(None),
                next_flight: AtomicU64::new(0),
                last_error: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task_handles: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Device name this coordinator polls.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first refresh, then spawn the refresh timer.
    ///
    /// The timer is spawned whatever the first outcome, so a device that
    /// is down at startup is picked up on a later tick. Calling this again
    /// only refreshes, and after [`shutdown()`](Self::shutdown) it fails.
    pub async fn start(&self) -> RefreshOutcome {
        let outcome = self.request_refresh().await;

        let period = self.inner.config.update_interval;
        if !period.is_zero()
            && !self.inner.cancel.is_cancelled()
            && !self.inner.started.swap(true, Ordering::AcqRel)
        {
            let task = poll_task(self.clone(), period, self.inner.cancel.clone());
            self.inner.task_handles.lock().await.push(tokio::spawn(task));
            debug!(device = %self.inner.name, ?period, "refresh timer started");
        }

        outcome
    }

    /// Stop the timer, wait for background tasks, and close the device
    /// session. A refresh in flight is allowed to finish first.
    ///
    /// The coordinator is inert afterwards: refreshes and commands fail
    /// with [`CoreError::Stopped`] instead of reopening the session.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Err(e) = self
            .with_client(|client| {
                client.disconnect();
                Ok(())
            })
            .await
        {
            warn!(device = %self.inner.name, error = %e, "failed to close device session");
        }
        debug!(device = %self.inner.name, "coordinator stopped");
    }

    /// One-shot: refresh once, run closure, shut down.
    ///
    /// The timer is disabled. A failed first refresh is returned as
    /// [`CoreError::Update`] without running the closure.
    pub async fn oneshot<F, Fut, T>(
        client: DeviceClient<C>,
        config: CoordinatorConfig,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(PollingCoordinator<C>) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.update_interval = Duration::ZERO;

        let coordinator = Self::new(client, cfg);
        let result = match coordinator.start().await {
            Ok(_) => f(coordinator.clone()).await,
            Err(failed) => Err(failed.into()),
        };
        coordinator.shutdown().await;
        result
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Refresh now, or attach to the refresh already in flight.
    ///
    /// At most one refresh runs against the client at any time. Every
    /// caller attached to the same refresh gets the same outcome. Once the
    /// coordinator is shut down no new refresh starts.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        self.join_or_start_flight().await
    }

    /// Refresh that is guaranteed to read the device after this call.
    ///
    /// A refresh already in flight may have read the device before the
    /// caller's last command, so wait it out and then request another.
    pub(crate) async fn refresh_after_command(&self) -> RefreshOutcome {
        let in_flight = lock(&self.inner.flight).as_ref().map(|f| f.future.clone());
        if let Some(stale) = in_flight {
            let _ = stale.await;
        }
        self.request_refresh().await
    }

    fn join_or_start_flight(&self) -> Flight {
        let mut slot = lock(&self.inner.flight);
        if let Some(flight) = slot.as_ref() {
            debug!(flight = flight.id, "attaching to refresh in flight");
            return flight.future.clone();
        }

        if let Err(e) = self.ensure_running() {
            debug!(device = %self.inner.name, "refresh refused after shutdown");
            return future::ready(Err(UpdateFailed::from(e))).boxed().shared();
        }

        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = inner.refresh_once().await;
            inner.finish_flight(id);
            outcome
        });

        let waiter = Arc::clone(&self.inner);
        let future = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    waiter.finish_flight(id);
                    Err(UpdateFailed::from(CoreError::Internal(format!(
                        "refresh task failed: {e}"
                    ))))
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            future: future.clone(),
        });
        future
    }

    /// Fails with [`CoreError::Stopped`] once [`shutdown()`](Self::shutdown)
    /// has begun.
    pub(crate) fn ensure_running(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped {
                device: self.inner.name.clone(),
            });
        }
        Ok(())
    }

    // ── Device access ────────────────────────────────────────────

    /// Run `f` against the client on the blocking pool.
    pub(crate) async fn with_client<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut DeviceClient<C>) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.inner.client);
        tokio::task::spawn_blocking(move || f(&mut *lock(&client)))
            .await
            .map_err(|e| CoreError::Internal(format!("device task failed: {e}")))?
    }

    /// The client's live state: the disconnected default whenever it has
    /// no session, regardless of what was last published.
    pub async fn live_state(&self) -> Result<DeviceState, CoreError> {
        self.with_client(|client| Ok(client.state())).await
    }

    /// Whether the client currently holds a device session.
    pub async fn is_connected(&self) -> Result<bool, CoreError> {
        self.with_client(|client| Ok(client.is_connected())).await
    }

    // ── State observation ────────────────────────────────────────

    /// Last successfully published state.
    pub fn state(&self) -> Arc<DeviceState> {
        self.inner.cache.load()
    }

    pub fn cache(&self) -> &StateCache {
        &self.inner.cache
    }

    /// Subscribe to published state.
    pub fn subscribe(&self) -> StateStream {
        self.inner.cache.subscribe()
    }

    /// Subscribe to every refresh outcome, including failures.
    pub fn updates(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.events.subscribe()
    }

    /// Register a callback invoked with each newly published state.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<DeviceState>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Unregister a callback. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn refresh_status(&self) -> RefreshState {
        if lock(&self.inner.flight).is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// `false` if the most recent refresh failed.
    pub fn last_update_success(&self) -> bool {
        lock(&self.inner.last_error).is_none()
    }

    /// The failure of the most recent refresh, if it failed.
    pub fn last_error(&self) -> Option<UpdateFailed> {
        lock(&self.inner.last_error).clone()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.inner.cache.last_refreshed()
    }
}

impl<C: Connector> CoordinatorInner<C> {
    /// Execute one refresh on the blocking pool and publish or record it.
    async fn refresh_once(&self) -> RefreshOutcome {
        let client = Arc::clone(&self.client);
        let result = tokio::task::spawn_blocking(move || -> Result<DeviceState, CoreError> {
            let mut client = lock(&client);
            client.refresh_state()?;
            Ok(client.state())
        })
        .await
        .unwrap_or_else(|e| Err(CoreError::Internal(format!("refresh task failed: {e}"))));

        match result {
            Ok(state) => {
                let state = Arc::new(state);
                self.publish(Arc::clone(&state));
                Ok(state)
            }
            Err(e) => {
                let failed = UpdateFailed::from(e);
                self.record_failure(failed.clone());
                Err(failed)
            }
        }
    }

    fn publish(&self, state: Arc<DeviceState>) {
        self.cache.publish(Arc::clone(&state));

        if lock(&self.last_error).take().is_some() {
            info!(device = %self.name, "device update recovered");
        }
        debug!(
            device = %self.name,
            input_count = state.input_count,
            selected = %state.selected_source,
            "published device state"
        );

        // Snapshot the callbacks so they may (un)register listeners.
        let listeners: Vec<(ListenerId, Listener)> = lock(&self.listeners)
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            // A panicking callback must not fail the refresh it observes.
            if catch_unwind(AssertUnwindSafe(|| listener(&state))).is_err() {
                error!(device = %self.name, listener = id.0, "state listener panicked");
            }
        }

        let _ = self.events.send(UpdateEvent::Published(state));
    }

    fn record_failure(&self, failed: UpdateFailed) {
        let previous = lock(&self.last_error).replace(failed.clone());

        // Log loudly once per outage; repeats are only interesting when debugging.
        if previous.is_some() {
            debug!(device = %self.name, error = %failed, "device update still failing");
        } else if failed.is_communication() {
            warn!(device = %self.name, error = %failed, "device update failed");
        } else {
            error!(device = %self.name, error = ?failed.error(), "device update failed");
        }

        let _ = self.events.send(UpdateEvent::Failed(failed));
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = lock(&self.flight);
        if slot.as_ref().is_some_and(|f| f.id == id) {
            *slot = None;
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Request a refresh on every tick until cancelled.
async fn poll_task<C: Connector>(
    coordinator: PollingCoordinator<C>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Failures are already recorded and broadcast.
                let _ = coordinator.request_refresh().await;
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
