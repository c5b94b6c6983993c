//! Admin dashboard scenarios against the in-memory backend.

use std::time::Duration;

use super::*;
use crate::domain::{DomainError, LatLng, NewDriver};
use crate::services::{DriverApi, Endpoint, ErrorClass, MockBackend, MockFailure};

const QUIET: Duration = Duration::from_secs(3600);

fn p(lat: f64, lng: f64) -> LatLng {
    LatLng::new(lat, lng).unwrap()
}

async fn open(mock: &MockBackend, poll: Duration) -> AdminDashboard<MockBackend> {
    let admin = mock.add_account("root", "pw", Role::Admin);
    let session = mock.session_for(admin).unwrap();
    AdminDashboard::open(Arc::new(mock.clone()), session, PollConfig::every(poll))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn create_station_refreshes_the_list() {
    let mock = MockBackend::new();
    mock.add_station("Central", p(12.9716, 77.5946));
    let dash = open(&mock, QUIET).await;
    assert_eq!(dash.snapshot().await.stations.len(), 1);

    let station = dash
        .create_station("  Trinity ", 12.9730, 77.6170)
        .await
        .unwrap();
    assert_eq!(station.name, "Trinity");

    let view = dash.snapshot().await;
    let names: Vec<_> = view.stations.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Central", "Trinity"]);
    assert_eq!(mock.calls(Endpoint::ListStations), 2);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn invalid_station_issues_no_write() {
    let mock = MockBackend::new();
    let dash = open(&mock, QUIET).await;

    let err = dash.create_station("   ", 12.97, 77.59).await.unwrap_err();
    assert!(matches!(err, FeederError::Invalid(DomainError::EmptyStationName)));

    let err = dash.create_station("Nowhere", 91.0, 0.0).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);

    let err = dash
        .create_station("Nowhere", f64::NAN, 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);

    assert_eq!(mock.calls(Endpoint::CreateStation), 0);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn service_rejection_is_verbatim() {
    let mock = MockBackend::new();
    let dash = open(&mock, QUIET).await;
    mock.fail_next(
        Endpoint::CreateStation,
        MockFailure::Rejected("{'name': ['station with this name already exists.']}".into()),
    );

    let err = dash
        .create_station("Central", 12.97, 77.59)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "{'name': ['station with this name already exists.']}"
    );
    assert_eq!(mock.calls(Endpoint::ListStations), 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn only_simulating_drivers_are_listed() {
    let mock = MockBackend::new();
    let a = mock.add_account("a", "pw", Role::Driver);
    let b = mock.add_account("b", "pw", Role::Driver);
    let route = vec![p(1.0, 1.0), p(1.0, 2.0), p(1.0, 3.0)];
    let moving = mock
        .create_driver(&NewDriver::new(a, 4, route.clone()).unwrap())
        .await
        .unwrap();
    mock.create_driver(&NewDriver::new(b, 4, route).unwrap())
        .await
        .unwrap();
    mock.start_simulation(moving.id).await.unwrap();

    let dash = open(&mock, Duration::from_secs(3)).await;
    let view = dash.snapshot().await;
    assert_eq!(view.drivers.len(), 1);
    assert_eq!(view.drivers[0].id, moving.id);

    // the route runs out and the driver drops off the list on the next tick
    for _ in 0..3 {
        mock.tick_engine();
    }
    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert!(dash.snapshot().await.drivers.is_empty());
    assert_eq!(mock.calls(Endpoint::ListStations), 1);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failure_keeps_drivers() {
    let mock = MockBackend::new();
    let user = mock.add_account("a", "pw", Role::Driver);
    let driver = mock
        .create_driver(&NewDriver::new(user, 4, vec![p(1.0, 1.0), p(1.0, 2.0)]).unwrap())
        .await
        .unwrap();
    mock.start_simulation(driver.id).await.unwrap();
    let dash = open(&mock, QUIET).await;
    let before = dash.snapshot().await;

    mock.fail_next(Endpoint::ActiveDrivers, MockFailure::Transient);
    assert_eq!(dash.refresh_drivers().await, Reconciled::Retained);
    assert_eq!(dash.snapshot().await, before);
    dash.close().await;
}

#[tokio::test(start_paused = true)]
async fn rider_session_cannot_open_admin_view() {
    let mock = MockBackend::new();
    let rider = mock.add_account("rae", "pw", Role::Rider);
    let session = mock.session_for(rider).unwrap();

    let err = AdminDashboard::open(Arc::new(mock.clone()), session, PollConfig::every(QUIET))
        .await
        .err()
        .unwrap();
    assert_eq!(err.class(), ErrorClass::Authorization);
    assert_eq!(mock.calls(Endpoint::ListStations), 0);
}
