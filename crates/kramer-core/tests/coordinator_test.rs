// Integration tests for the polling coordinator and command dispatcher,
// driven end to end against the simulated switch.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use kramer_api::{Fault, SimConnector, SimulatedMatrix};
use kramer_core::{
    CommandDispatcher, CommandResult, ConnectionState, CoordinatorConfig, CoreError, DeviceClient,
    DeviceIdentity, DeviceState, PollingCoordinator, RefreshState, UpdateEvent,
    validate_connection,
};
use pretty_assertions::assert_eq;

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("Conference Room", "192.168.1.50", Some(5000))
}

fn manual() -> CoordinatorConfig {
    CoordinatorConfig {
        update_interval: Duration::ZERO,
        ..CoordinatorConfig::default()
    }
}

fn coordinator(
    matrix: &SimulatedMatrix,
    config: CoordinatorConfig,
) -> PollingCoordinator<SimConnector> {
    PollingCoordinator::new(DeviceClient::new(identity(), matrix.connector()), config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_refresh_publishes_then_timeout_keeps_last_good_state() {
    let matrix = SimulatedMatrix::new(3).with_selected(2);
    let coordinator = coordinator(&matrix, manual());

    let state = coordinator.start().await.unwrap();
    assert_eq!(state.input_count, 3);
    assert_eq!(&*state.source_list, ["0", "1", "2", "3"]);
    assert_eq!(state.selected_source, "2");
    assert_eq!(state.connection_state, ConnectionState::Connected);
    assert!(coordinator.last_update_success());

    matrix.fail_next(Fault::Timeout);
    let failed = coordinator.request_refresh().await.unwrap_err();

    assert!(failed.is_communication());
    assert!(!coordinator.last_update_success());
    assert!(coordinator.last_error().is_some());
    assert!(!coordinator.is_connected().await.unwrap());
    assert_eq!(coordinator.live_state().await.unwrap(), DeviceState::disconnected());
    // Published state is untouched by the failure.
    assert!(Arc::ptr_eq(&coordinator.state(), &state));

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_requests_share_one_refresh() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();

    matrix.set_latency(Duration::from_millis(100));
    let before = matrix.stats();

    let other = coordinator.clone();
    let (a, b) = tokio::join!(coordinator.request_refresh(), other.request_refresh());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(matrix.stats().total() - before.total(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(coordinator.refresh_status(), RefreshState::Idle);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_refresh_is_shared_by_every_waiter() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();

    matrix.set_latency(Duration::from_millis(100));
    matrix.fail_next(Fault::Protocol);

    let other = coordinator.clone();
    let (a, b) = tokio::join!(coordinator.request_refresh(), other.request_refresh());

    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert!(!a.is_communication());
    assert!(matches!(b.error(), CoreError::Generic { .. }));
    assert_eq!(matrix.stats().updates, 1);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_source_routes_input_and_refreshes() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    let result = dispatcher.select_source("2").await.unwrap();

    let CommandResult::Refreshed(state) = result else {
        panic!("expected a refreshed state, got {result:?}");
    };
    assert_eq!(state.selected_source, "2");
    assert_eq!(matrix.selected(), 2);
    assert_eq!(coordinator.state().selected_source, "2");
    assert_eq!(matrix.stats().selects, 1);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_during_refresh_publishes_the_selected_source() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    matrix.set_latency(Duration::from_millis(200));
    let before = matrix.stats();
    let background = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_refresh().await }
    });

    // Wait until the background refresh holds the session.
    tokio::time::timeout(Duration::from_secs(5), async {
        while matrix.stats().updates == before.updates {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(coordinator.refresh_status(), RefreshState::Refreshing);

    let result = dispatcher.select_source("3").await.unwrap();

    assert_eq!(result.state().unwrap().selected_source, "3");
    assert_eq!(coordinator.state().selected_source, "3");

    // The earlier refresh read the device before the command landed.
    let earlier = background.await.unwrap().unwrap();
    assert_eq!(earlier.selected_source, "1");
    assert_eq!(matrix.stats().updates - before.updates, 2);
    assert_eq!(matrix.stats().selects, 1);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn execute_routes_commands() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    let result = dispatcher
        .execute(kramer_core::Command::SelectSource {
            source: " 3 ".into(),
        })
        .await
        .unwrap();

    assert_eq!(result.state().unwrap().selected_source, "3");
    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_source_issues_no_io_and_keeps_state() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());
    let before_stats = matrix.stats();
    let before_state = coordinator.state();

    let err = dispatcher.select_source("abc").await.unwrap_err();

    assert!(matches!(err, CoreError::InvalidSource { ref identifier, .. } if identifier == "abc"));
    assert_eq!(matrix.stats(), before_stats);
    assert!(Arc::ptr_eq(&coordinator.state(), &before_state));

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_failure_propagates_without_refresh() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    matrix.fail_next(Fault::Timeout);
    let err = dispatcher.select_source("1").await.unwrap_err();

    assert!(err.is_communication());
    assert_eq!(matrix.stats().updates, 0);
    assert!(!coordinator.is_connected().await.unwrap());

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn select_before_first_refresh_is_not_connected() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    let err = dispatcher.select_source("1").await.unwrap_err();

    assert!(matches!(err, CoreError::NotConnected { .. }));
    assert_eq!(matrix.stats().total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listeners_fire_only_on_publish() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let id = coordinator.add_listener(move |state| {
        assert!(state.is_connected());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    coordinator.start().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    matrix.fail_next(Fault::Refused);
    coordinator.request_refresh().await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(coordinator.remove_listener(id));
    coordinator.request_refresh().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!coordinator.remove_listener(id));

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_listener_does_not_fail_the_refresh() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    let mut events = coordinator.updates();
    let calls = Arc::new(AtomicUsize::new(0));

    coordinator.add_listener(|_| panic!("listener failure"));
    let counter = Arc::clone(&calls);
    coordinator.add_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let state = coordinator.start().await.unwrap();
    assert!(state.is_connected());
    assert!(coordinator.last_update_success());
    assert!(matches!(events.recv().await.unwrap(), UpdateEvent::Published(_)));

    coordinator.request_refresh().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), UpdateEvent::Published(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.refresh_status(), RefreshState::Idle);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_events_report_failures() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    let mut events = coordinator.updates();

    coordinator.start().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), UpdateEvent::Published(_)));

    matrix.fail_next(Fault::Timeout);
    coordinator.request_refresh().await.unwrap_err();
    let UpdateEvent::Failed(failed) = events.recv().await.unwrap() else {
        panic!("expected a failure event");
    };
    assert!(failed.is_communication());

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn offline_device_recovers_on_a_later_refresh() {
    let matrix = SimulatedMatrix::new(2);
    matrix.set_online(false);
    let coordinator = coordinator(&matrix, manual());

    let failed = coordinator.start().await.unwrap_err();
    assert!(failed.is_communication());
    assert!(!coordinator.state().is_connected());

    coordinator.request_refresh().await.unwrap_err();
    assert!(!coordinator.last_update_success());

    matrix.set_online(true);
    let state = coordinator.request_refresh().await.unwrap();

    assert!(state.is_connected());
    assert_eq!(state.input_count, 2);
    assert!(coordinator.last_update_success());
    assert!(coordinator.last_refreshed().is_some());
    assert_eq!(matrix.stats().connects, 3);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timer_refreshes_in_the_background() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(
        &matrix,
        CoordinatorConfig {
            update_interval: Duration::from_millis(50),
            ..CoordinatorConfig::default()
        },
    );
    coordinator.start().await.unwrap();
    let mut stream = coordinator.subscribe();

    matrix.set_selected(3);

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.changed().await {
                Some(state) if state.selected_source == "3" => break state,
                Some(_) => {}
                None => panic!("coordinator dropped"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(seen.selected_source, "3");
    assert_eq!(matrix.stats().connects, 1);
    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timer_tick_attaches_to_refresh_in_flight() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(
        &matrix,
        CoordinatorConfig {
            update_interval: Duration::from_millis(300),
            ..CoordinatorConfig::default()
        },
    );
    coordinator.start().await.unwrap();

    matrix.set_latency(Duration::from_millis(450));
    let before = matrix.stats();

    // The tick due at 300ms lands mid-refresh; the next is due at 600ms.
    coordinator.request_refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(matrix.stats().updates - before.updates, 1);
    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn state_stream_yields_latest_then_each_publish() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    let mut stream = coordinator.subscribe().into_stream();

    let initial = stream.next().await.unwrap();
    assert!(!initial.is_connected());

    coordinator.start().await.unwrap();
    let published = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(published.is_connected());
    assert_eq!(published.input_count, 4);

    coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_the_session() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(
        &matrix,
        CoordinatorConfig {
            update_interval: Duration::from_millis(20),
            ..CoordinatorConfig::default()
        },
    );
    coordinator.start().await.unwrap();
    assert!(coordinator.is_connected().await.unwrap());

    coordinator.shutdown().await;

    assert!(!coordinator.is_connected().await.unwrap());
    let after = matrix.stats();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(matrix.stats(), after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_refuses_new_refreshes_and_commands() {
    let matrix = SimulatedMatrix::new(4);
    let coordinator = coordinator(&matrix, manual());
    coordinator.start().await.unwrap();
    let dispatcher = CommandDispatcher::new(coordinator.clone());

    coordinator.shutdown().await;
    let after = matrix.stats();

    let failed = coordinator.request_refresh().await.unwrap_err();
    assert!(matches!(failed.error(), CoreError::Stopped { .. }));
    let err = dispatcher.select_source("2").await.unwrap_err();
    assert!(matches!(err, CoreError::Stopped { .. }));
    assert!(coordinator.start().await.is_err());

    assert_eq!(matrix.stats(), after);
    assert!(!coordinator.is_connected().await.unwrap());
    assert!(coordinator.last_update_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oneshot_refreshes_runs_and_disconnects() {
    let matrix = SimulatedMatrix::new(5);

    let state = PollingCoordinator::oneshot(
        DeviceClient::new(identity(), matrix.connector()),
        CoordinatorConfig::default(),
        |coordinator| async move { Ok(coordinator.state()) },
    )
    .await
    .unwrap();

    assert_eq!(state.input_count, 5);

    matrix.set_online(false);
    let err = PollingCoordinator::oneshot(
        DeviceClient::new(identity(), matrix.connector()),
        CoordinatorConfig::default(),
        |_| async { Ok(()) },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::Update(_)));
    assert!(err.is_communication());
}

#[tokio::test]
async fn validate_connection_reports_the_failure_kind() {
    let matrix = SimulatedMatrix::new(4);
    let state = validate_connection(identity(), matrix.connector()).await.unwrap();
    assert_eq!(state.input_count, 4);

    matrix.fail_next(Fault::Timeout);
    let err = validate_connection(identity(), matrix.connector())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Communication { .. }));

    matrix.fail_next(Fault::Protocol);
    let err = validate_connection(identity(), matrix.connector())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Generic { .. }));
}
