//! Driver dashboard scenarios against the in-memory backend.

use std::time::Duration;

use super::*;
use crate::domain::{DomainError, StationId, UserId};
use crate::services::{DriverApi, Endpoint, ErrorClass, MockBackend, MockFailure};

/// Long enough that timers never fire unless a test waits for them.
const QUIET: Duration = Duration::from_secs(3600);

fn p(lat: f64, lng: f64) -> LatLng {
    LatLng::new(lat, lng).unwrap()
}

async fn open(mock: &MockBackend, poll: Duration) -> (DriverDashboard<MockBackend>, UserId) {
    let user = mock.add_account("dee", "pw", Role::Driver);
    let session = mock.session_for(user).unwrap();
    let dash = DriverDashboard::open(Arc::new(mock.clone()), session, PollConfig::every(poll))
        .await
        .unwrap();
    (dash, user)
}

fn two_stops() -> Vec<LatLng> {
    vec![p(12.9716, 77.5946), p(12.9730, 77.6170)]
}

#[tokio::test(start_paused = true)]
async fn opens_empty_for_new_user() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;

    let view = dash.snapshot().await;
    assert_eq!(view.driver, DriverState::Unregistered);
    assert!(view.matches.is_empty());
    assert_eq!(mock.calls(Endpoint::DriverForUser), 1);
    assert_eq!(mock.calls(Endpoint::ListStations), 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn wrong_role_is_refused_before_any_call() {
    let mock = MockBackend::new();
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let session = mock.session_for(rider).unwrap();

    let err = DriverDashboard::open(Arc::new(mock.clone()), session, PollConfig::every(QUIET))
        .await
        .err()
        .unwrap();
    assert_eq!(err.class(), ErrorClass::Authorization);
    assert_eq!(mock.calls(Endpoint::DriverForUser), 0);
}

#[tokio::test(start_paused = true)]
async fn completed_route_clears_driver_and_matches_together() {
    let mock = MockBackend::new();
    let station = mock.add_station("Trinity", p(12.9730, 77.6170));
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let (dash, _) = open(&mock, QUIET).await;

    let driver = dash.register(4, two_stops()).await.unwrap();
    assert_eq!(driver.route_queue.len(), 2);
    dash.start().await.unwrap();
    assert!(matches!(dash.snapshot().await.driver, DriverState::Simulating(_)));

    mock.form_match(rider, driver.id, station.id);
    assert_eq!(dash.refresh_matches().await, Reconciled::Replaced);
    assert_eq!(dash.snapshot().await.matches.len(), 1);

    mock.tick_engine();
    mock.tick_engine();
    assert_eq!(dash.refresh_driver().await, Reconciled::Replaced);
    let view = dash.snapshot().await;
    assert!(view.driver.is_eligible_for_removal());
    assert_eq!(view.matches.len(), 1);

    // the engine deletes the finished driver
    mock.tick_engine();
    assert_eq!(dash.refresh_driver().await, Reconciled::Cleared);
    let view = dash.snapshot().await;
    assert_eq!(view.driver, DriverState::Removed { last: driver.id });
    assert!(view.matches.is_empty());

    let before = mock.calls(Endpoint::MatchesForDriver);
    assert_eq!(dash.refresh_matches().await, Reconciled::Skipped);
    assert_eq!(mock.calls(Endpoint::MatchesForDriver), before);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn unexpected_removal_also_clears_matches() {
    let mock = MockBackend::new();
    let station = mock.add_station("Trinity", p(12.9730, 77.6170));
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let (dash, _) = open(&mock, QUIET).await;

    let driver = dash.register(4, two_stops()).await.unwrap();
    mock.form_match(rider, driver.id, station.id);
    dash.refresh_matches().await;

    mock.remove_driver(driver.id);
    assert_eq!(dash.refresh_driver().await, Reconciled::Cleared);
    let view = dash.snapshot().await;
    assert!(!view.driver.is_known());
    assert!(view.matches.is_empty());
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn replaced_driver_takes_old_matches_with_it() {
    let mock = MockBackend::new();
    let station = mock.add_station("Trinity", p(12.9730, 77.6170));
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let (dash, user) = open(&mock, QUIET).await;

    let old = dash.register(4, two_stops()).await.unwrap();
    mock.form_match(rider, old.id, station.id);
    assert_eq!(dash.refresh_matches().await, Reconciled::Replaced);

    // an operator deletes the driver and the user registers again elsewhere
    mock.remove_driver(old.id);
    let new = mock
        .create_driver(&NewDriver::new(user, 2, two_stops()).unwrap())
        .await
        .unwrap();
    assert_ne!(new.id, old.id);

    assert_eq!(dash.refresh_driver().await, Reconciled::Replaced);
    let view = dash.snapshot().await;
    assert_eq!(view.driver.driver_id(), Some(new.id));
    assert!(view.matches.iter().all(|m| m.driver_id == new.id));
    assert!(view.matches.is_empty());
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn invalid_registration_issues_no_write() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;

    let err = dash.register(4, vec![p(1.0, 1.0)]).await.unwrap_err();
    assert!(matches!(
        err,
        FeederError::Invalid(DomainError::RouteTooShort { points: 1 })
    ));
    assert_eq!(err.class(), ErrorClass::Validation);

    let err = dash.register(0, two_stops()).await.unwrap_err();
    assert!(matches!(err, FeederError::Invalid(DomainError::SeatsOutOfRange(0))));

    assert_eq!(mock.calls(Endpoint::CreateDriver), 0);
    assert_eq!(dash.snapshot().await.driver, DriverState::Unregistered);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_create_is_surfaced_verbatim_and_not_retried() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;
    mock.fail_next(
        Endpoint::CreateDriver,
        MockFailure::Rejected("{'route': ['Route must have at least 2 points']}".into()),
    );

    let err = dash.register(4, two_stops()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "{'route': ['Route must have at least 2 points']}"
    );
    assert_eq!(mock.calls(Endpoint::CreateDriver), 1);
    assert_eq!(dash.snapshot().await.driver, DriverState::Unregistered);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn second_registration_is_refused() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;
    let driver = dash.register(4, two_stops()).await.unwrap();

    let err = dash.register(4, two_stops()).await.unwrap_err();
    assert!(matches!(
        err,
        FeederError::NotPermitted(NotPermitted::DriverExists(id)) if id == driver.id
    ));
    assert_eq!(mock.calls(Endpoint::CreateDriver), 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn start_without_driver_is_refused() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;

    let err = dash.start().await.unwrap_err();
    assert!(matches!(err, FeederError::NotPermitted(NotPermitted::NoDriver)));
    assert_eq!(mock.calls(Endpoint::StartSimulation), 0);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn stop_on_vanished_driver_clears_quietly() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;
    let driver = dash.register(4, two_stops()).await.unwrap();
    mock.remove_driver(driver.id);

    dash.stop().await.unwrap();
    assert_eq!(
        dash.snapshot().await.driver,
        DriverState::Removed { last: driver.id }
    );
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn polls_of_one_resource_never_overlap() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;
    mock.set_latency(Endpoint::DriverForUser, Duration::from_secs(2));
    let before = mock.calls(Endpoint::DriverForUser);

    let (first, during) = tokio::join!(dash.refresh_driver(), async {
        dash.poll_tick().await;
        mock.calls(Endpoint::DriverForUser)
    });
    assert_eq!(first, Reconciled::Cleared);
    // the tick found the explicit fetch in flight and skipped
    assert_eq!(during, before + 1);

    tokio::join!(dash.refresh_driver(), dash.refresh_driver());
    assert_eq!(mock.max_in_flight(Endpoint::DriverForUser), 1);
    assert_eq!(mock.calls(Endpoint::DriverForUser), before + 3);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn slow_backend_delays_timer_instead_of_stacking() {
    let mock = MockBackend::new();
    mock.set_latency(Endpoint::DriverForUser, Duration::from_secs(5));
    let (dash, _) = open(&mock, Duration::from_secs(1)).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(mock.max_in_flight(Endpoint::DriverForUser), 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failure_keeps_last_snapshot() {
    let mock = MockBackend::new();
    let station = mock.add_station("Trinity", p(12.9730, 77.6170));
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let (dash, _) = open(&mock, QUIET).await;
    let driver = dash.register(4, two_stops()).await.unwrap();
    mock.form_match(rider, driver.id, station.id);
    dash.refresh_driver().await;
    dash.refresh_matches().await;
    let before = dash.snapshot().await;

    mock.set_free_seats(driver.id, 1);
    mock.fail_next(Endpoint::DriverForUser, MockFailure::Transient);
    mock.fail_next(Endpoint::MatchesForDriver, MockFailure::Transient);
    assert_eq!(dash.refresh_driver().await, Reconciled::Retained);
    assert_eq!(dash.refresh_matches().await, Reconciled::Retained);
    assert_eq!(dash.snapshot().await, before);

    // the next poll catches up
    assert_eq!(dash.refresh_driver().await, Reconciled::Replaced);
    assert_eq!(dash.snapshot().await.driver.driver().unwrap().free_seats, 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn not_found_from_before_create_is_discarded() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, QUIET).await;
    mock.set_latency(Endpoint::DriverForUser, Duration::from_secs(5));

    // the poll goes out while no driver exists, the create lands while it is
    // still in flight
    let (stale, created) = tokio::join!(dash.refresh_driver(), dash.register(4, two_stops()));
    let created = created.unwrap();

    assert_eq!(stale, Reconciled::Discarded);
    assert_eq!(dash.snapshot().await.driver.driver_id(), Some(created.id));
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn read_after_write_lag_is_tolerated_once() {
    let mock = MockBackend::new();
    mock.lag_reads_after_create(true);
    let (dash, _) = open(&mock, QUIET).await;

    let driver = dash.register(4, two_stops()).await.unwrap();
    let view = dash.snapshot().await;
    assert_eq!(view.driver.driver_id(), Some(driver.id));
    assert!(matches!(view.driver, DriverState::Idle(_)));

    assert_eq!(dash.refresh_driver().await, Reconciled::Replaced);

    // a second not-found is believed
    mock.remove_driver(driver.id);
    assert_eq!(dash.refresh_driver().await, Reconciled::Cleared);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn match_poll_gated_until_driver_known() {
    let mock = MockBackend::new();
    let (dash, user) = open(&mock, Duration::from_secs(3)).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.calls(Endpoint::MatchesForDriver), 0);

    // registered elsewhere; the driver timer picks it up
    let new = crate::domain::NewDriver::new(user, 2, two_stops()).unwrap();
    mock.create_driver(&new).await.unwrap();
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(dash.snapshot().await.driver.is_known());
    assert!(mock.calls(Endpoint::MatchesForDriver) > 0);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn timers_follow_the_engine() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, Duration::from_secs(3)).await;
    dash.register(4, vec![p(1.0, 1.0), p(1.0, 2.0), p(1.0, 3.0)])
        .await
        .unwrap();
    dash.start().await.unwrap();

    mock.tick_engine();
    tokio::time::sleep(Duration::from_millis(3100)).await;
    let view = dash.snapshot().await;
    assert_eq!(view.driver.driver().unwrap().route_queue.len(), 2);
    assert_eq!(view.driver.driver().unwrap().position, p(1.0, 1.0));
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn result_landing_after_close_is_discarded() {
    let mock = MockBackend::new();
    let (dash, user) = open(&mock, QUIET).await;
    let new = crate::domain::NewDriver::new(user, 4, two_stops()).unwrap();
    mock.create_driver(&new).await.unwrap();
    mock.set_latency(Endpoint::DriverForUser, Duration::from_secs(5));

    let probe = Arc::clone(&dash.shared);
    let late = {
        let shared = Arc::clone(&dash.shared);
        tokio::spawn(async move { shared.refresh_driver(Trigger::Explicit).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    dash.close().await;

    assert_eq!(late.await.unwrap(), Reconciled::Discarded);
    assert_eq!(probe.state.read().await.view.driver, DriverState::Unregistered);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_dashboard_stops_polling() {
    let mock = MockBackend::new();
    let (dash, _) = open(&mock, Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    drop(dash);

    let at_drop = mock.calls(Endpoint::DriverForUser);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.calls(Endpoint::DriverForUser), at_drop);
}

#[tokio::test(start_paused = true)]
async fn match_station_names_resolve() {
    let mock = MockBackend::new();
    let station = mock.add_station("Trinity", p(12.9730, 77.6170));
    let (dash, _) = open(&mock, QUIET).await;

    let view = dash.snapshot().await;
    assert_eq!(view.station_name(station.id), "Trinity");
    assert_eq!(view.station_name(StationId(99)), "Station 99");
    dash.close().await;
}
