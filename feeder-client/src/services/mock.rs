//! In-memory backend for tests and offline runs.
//!
//! Holds the same entities the real services do and answers the service
//! traits from them. Tests can script failures per endpoint, add response
//! latency, and step a tiny stand-in for the driver engine with
//! [`MockBackend::tick_engine`].
//!
//! Latency is applied after the response has been computed, so a slow call
//! returns what the store looked like when it arrived, which is what a slow
//! network does.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::domain::{
    Cancellation, Driver, DriverId, LatLng, Match, MatchId, MatchStatus, NewDriver,
    NewRideRequest, NewStation, RideRequest, RideRequestId, RideStatus, Role, SimTime, Station,
    StationId, UserId,
};
use crate::session::Session;

use super::error::ServiceError;
use super::{DriverApi, IdentityApi, MatchingApi, Registration, RiderApi, StationApi};

/// Engine clock at startup.
const START_CLOCK: (u32, u32) = (10, 0);

/// One backend call, for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Register,
    ListStations,
    CreateStation,
    CreateDriver,
    DriverForUser,
    StartSimulation,
    StopSimulation,
    ActiveDrivers,
    CreateRide,
    RidesForRider,
    CancelRide,
    MatchesForRider,
    MatchesForDriver,
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// 503 from the service
    Transient,
    NotFound,
    Rejected(String),
    Unauthorized,
}

impl MockFailure {
    fn into_error(self, endpoint: Endpoint) -> ServiceError {
        match self {
            MockFailure::Transient => ServiceError::Api {
                status: 503,
                message: format!("{endpoint:?} unavailable"),
            },
            MockFailure::NotFound => ServiceError::NotFound {
                message: format!("{endpoint:?}: not found"),
            },
            MockFailure::Rejected(message) => ServiceError::Validation { message },
            MockFailure::Unauthorized => ServiceError::Unauthorized {
                message: "Invalid credentials".into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    username: String,
    password: String,
    role: Role,
}

#[derive(Debug)]
struct MockState {
    accounts: Vec<Account>,
    stations: Vec<Station>,
    drivers: BTreeMap<DriverId, Driver>,
    rides: BTreeMap<RideRequestId, RideRequest>,
    matches: Vec<Match>,
    next_id: i64,
    clock: SimTime,
    /// Drivers whose route finished on the last tick; deleted on the next.
    finishing: BTreeSet<DriverId>,
    /// Users whose driver is not yet visible to reads.
    lagging_reads: BTreeSet<UserId>,
    lag_reads_after_create: bool,

    failures: HashMap<Endpoint, VecDeque<MockFailure>>,
    latency: HashMap<Endpoint, Duration>,
    calls: HashMap<Endpoint, usize>,
    in_flight: HashMap<Endpoint, usize>,
    max_in_flight: HashMap<Endpoint, usize>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            stations: Vec::new(),
            drivers: BTreeMap::new(),
            rides: BTreeMap::new(),
            matches: Vec::new(),
            next_id: 1,
            clock: SimTime::from_hm(START_CLOCK.0, START_CLOCK.1).unwrap_or_default(),
            finishing: BTreeSet::new(),
            lagging_reads: BTreeSet::new(),
            lag_reads_after_create: false,
            failures: HashMap::new(),
            latency: HashMap::new(),
            calls: HashMap::new(),
            in_flight: HashMap::new(),
            max_in_flight: HashMap::new(),
        }
    }
}

impl MockState {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn driver_for_user(&self, user: UserId) -> Option<&Driver> {
        self.drivers.values().find(|d| d.user_id == user)
    }
}

/// In-memory implementation of every service trait.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

/// Decrements the in-flight count when a call finishes or is dropped.
struct InFlight<'a> {
    backend: &'a MockBackend,
    endpoint: Endpoint,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(n) = self.backend.lock().in_flight.get_mut(&self.endpoint) {
            *n = n.saturating_sub(1);
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one backend call: account for it, apply any scripted failure,
    /// then hold the answer back for the configured latency.
    async fn call<T>(
        &self,
        endpoint: Endpoint,
        op: impl FnOnce(&mut MockState) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let (result, delay, _in_flight) = {
            let mut state = self.lock();
            *state.calls.entry(endpoint).or_default() += 1;

            let current = {
                let n = state.in_flight.entry(endpoint).or_default();
                *n += 1;
                *n
            };
            let max = state.max_in_flight.entry(endpoint).or_default();
            *max = (*max).max(current);

            let scripted = state
                .failures
                .get_mut(&endpoint)
                .and_then(VecDeque::pop_front);
            let result = match scripted {
                Some(failure) => Err(failure.into_error(endpoint)),
                None => op(&mut *state),
            };
            let delay = state.latency.get(&endpoint).copied();
            let guard = InFlight {
                backend: self,
                endpoint,
            };
            (result, delay, guard)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    // ---- scripting ----

    /// Make the next call to `endpoint` fail. Failures queue up in order.
    pub fn fail_next(&self, endpoint: Endpoint, failure: MockFailure) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(failure);
    }

    /// Hold every answer from `endpoint` back by `delay`.
    pub fn set_latency(&self, endpoint: Endpoint, delay: Duration) {
        self.lock().latency.insert(endpoint, delay);
    }

    /// After a driver is created, the first read for its user answers
    /// not-found, as a lagging read replica would.
    pub fn lag_reads_after_create(&self, lag: bool) {
        self.lock().lag_reads_after_create = lag;
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// The most calls to `endpoint` that were ever outstanding at once.
    pub fn max_in_flight(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .max_in_flight
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    // ---- seeding and inspection ----

    pub fn add_account(&self, username: &str, password: &str, role: Role) -> UserId {
        let mut state = self.lock();
        let id = UserId(state.allocate_id());
        state.accounts.push(Account {
            id,
            username: username.to_string(),
            password: password.to_string(),
            role,
        });
        id
    }

    /// Session for a seeded account, skipping the login call.
    pub fn session_for(&self, user: UserId) -> Option<Session> {
        let state = self.lock();
        let account = state.accounts.iter().find(|a| a.id == user)?;
        Some(Session {
            user_id: account.id,
            username: account.username.clone(),
            role: account.role,
            token: format!("mock-{}", account.id),
        })
    }

    pub fn add_station(&self, name: &str, location: LatLng) -> Station {
        let mut state = self.lock();
        let station = Station {
            id: StationId(state.allocate_id()),
            name: name.to_string(),
            location,
        };
        state.stations.push(station.clone());
        station
    }

    pub fn add_ride(&self, rider: UserId, station: StationId, eta: &str) -> RideRequest {
        let mut state = self.lock();
        let ride = RideRequest {
            id: RideRequestId(state.allocate_id()),
            rider_id: rider,
            station_id: station,
            eta: eta.to_string(),
            destination: LatLng { lat: 0.0, lng: 0.0 },
            status: RideStatus::Looking,
        };
        state.rides.insert(ride.id, ride.clone());
        ride
    }

    pub fn set_ride_status(&self, ride: RideRequestId, status: RideStatus) {
        if let Some(r) = self.lock().rides.get_mut(&ride) {
            r.status = status;
        }
    }

    pub fn ride(&self, ride: RideRequestId) -> Option<RideRequest> {
        self.lock().rides.get(&ride).cloned()
    }

    pub fn driver(&self, driver: DriverId) -> Option<Driver> {
        self.lock().drivers.get(&driver).cloned()
    }

    pub fn set_free_seats(&self, driver: DriverId, seats: u8) {
        if let Some(d) = self.lock().drivers.get_mut(&driver) {
            d.free_seats = seats;
        }
    }

    /// Delete a driver outright, as an operator might.
    pub fn remove_driver(&self, driver: DriverId) {
        self.lock().drivers.remove(&driver);
    }

    /// Record a match without touching the ride's status, as the matching
    /// service does before the rider service catches up.
    pub fn insert_match(&self, rider: UserId, driver: DriverId, station: StationId) -> Match {
        let mut state = self.lock();
        let m = Match {
            id: MatchId(state.allocate_id()),
            driver_id: driver,
            rider_id: rider,
            station_id: station,
            formed_at: Some(state.clock),
            status: MatchStatus::Active,
        };
        state.matches.push(m.clone());
        m
    }

    /// Move a match along the trip pipeline, as the trip service does when a
    /// ride finishes.
    pub fn set_match_status(&self, id: MatchId, status: MatchStatus) {
        if let Some(m) = self.lock().matches.iter_mut().find(|m| m.id == id) {
            m.status = status;
        }
    }

    /// Pair a rider's LOOKING request at `station` with `driver`: record the
    /// match, mark the request MATCHED and take a seat.
    pub fn form_match(&self, rider: UserId, driver: DriverId, station: StationId) -> Match {
        let m = self.insert_match(rider, driver, station);
        let mut state = self.lock();
        if let Some(ride) = state.rides.values_mut().find(|r| {
            r.rider_id == rider && r.station_id == station && r.status == RideStatus::Looking
        }) {
            ride.status = RideStatus::Matched;
        }
        if let Some(d) = state.drivers.get_mut(&driver) {
            d.free_seats = d.free_seats.saturating_sub(1);
            d.matched_station = Some(station);
        }
        m
    }

    /// Advance the stand-in engine one step.
    ///
    /// Drivers that finished on the previous tick are deleted. Every
    /// simulating driver then moves to the head of its queue and the clock
    /// advances a minute; a driver whose queue runs dry stops and is
    /// deleted on the following tick.
    pub fn tick_engine(&self) {
        let mut state = self.lock();

        for id in std::mem::take(&mut state.finishing) {
            debug!(driver = %id, "mock engine: removing finished driver");
            state.drivers.remove(&id);
        }

        let clock = state.clock.plus_minutes(1);
        state.clock = clock;

        let mut finished = Vec::new();
        for driver in state.drivers.values_mut().filter(|d| d.is_simulating) {
            if !driver.route_queue.is_empty() {
                driver.position = driver.route_queue.remove(0);
                driver.sim_timestamp = Some(clock);
            }
            if driver.route_queue.is_empty() {
                driver.is_simulating = false;
                driver.matched_station = None;
                finished.push(driver.id);
            }
        }
        state.finishing.extend(finished);
    }

    /// Pair each LOOKING request with a simulating driver that still has a
    /// seat and whose remaining route passes the request's station.
    pub fn match_waiting_riders(&self) -> usize {
        let pairs: Vec<(UserId, DriverId, StationId)> = {
            let state = self.lock();
            let mut seats: BTreeMap<DriverId, u8> = state
                .drivers
                .values()
                .map(|d| (d.id, d.free_seats))
                .collect();
            let mut pairs = Vec::new();
            for ride in state.rides.values().filter(|r| r.status == RideStatus::Looking) {
                let Some(station) = state.stations.iter().find(|s| s.id == ride.station_id) else {
                    continue;
                };
                let driver = state.drivers.values().find(|d| {
                    d.is_simulating
                        && seats.get(&d.id).is_some_and(|n| *n > 0)
                        && d.route_queue.contains(&station.location)
                });
                if let Some(d) = driver {
                    if let Some(n) = seats.get_mut(&d.id) {
                        *n -= 1;
                    }
                    pairs.push((ride.rider_id, d.id, station.id));
                }
            }
            pairs
        };

        for (rider, driver, station) in &pairs {
            self.form_match(*rider, *driver, *station);
        }
        pairs.len()
    }

    /// A small world for offline runs: one account per role, three stations
    /// on a line, and a rider already waiting at the last of them.
    pub fn demo() -> Self {
        let mock = Self::new();
        mock.add_account("admin", "admin", Role::Admin);
        let rider = mock.add_account("rider", "rider", Role::Rider);
        mock.add_account("driver", "driver", Role::Driver);

        let points = [
            ("Central", 12.9716, 77.5946),
            ("Trinity", 12.9730, 77.6170),
            ("Indiranagar", 12.9784, 77.6408),
        ];
        let stations: Vec<Station> = points
            .iter()
            .filter_map(|(name, lat, lng)| {
                LatLng::new(*lat, *lng)
                    .ok()
                    .map(|at| mock.add_station(name, at))
            })
            .collect();

        if let Some(last) = stations.last() {
            mock.add_ride(rider, last.id, "10:30");
        }
        mock
    }
}

impl IdentityApi for MockBackend {
    async fn login(&self, username: &str, password: &str) -> Result<Session, ServiceError> {
        self.call(Endpoint::Login, |state| {
            let account = state
                .accounts
                .iter()
                .find(|a| a.username == username)
                .ok_or_else(|| ServiceError::NotFound {
                    message: "User not found".into(),
                })?;
            if account.password != password {
                return Err(ServiceError::Unauthorized {
                    message: "Invalid credentials".into(),
                });
            }
            Ok(Session {
                user_id: account.id,
                username: account.username.clone(),
                role: account.role,
                token: format!("mock-{}", account.id),
            })
        })
        .await
    }

    async fn register(&self, registration: &Registration) -> Result<UserId, ServiceError> {
        self.call(Endpoint::Register, |state| {
            if state
                .accounts
                .iter()
                .any(|a| a.username == registration.username)
            {
                return Err(ServiceError::Validation {
                    message: "{'username': ['user with this username already exists.']}".into(),
                });
            }
            let id = UserId(state.allocate_id());
            state.accounts.push(Account {
                id,
                username: registration.username.clone(),
                password: registration.password.clone(),
                role: registration.role,
            });
            Ok(id)
        })
        .await
    }
}

impl StationApi for MockBackend {
    async fn list_stations(&self) -> Result<Vec<Station>, ServiceError> {
        self.call(Endpoint::ListStations, |state| Ok(state.stations.clone()))
            .await
    }

    async fn create_station(&self, station: &NewStation) -> Result<Station, ServiceError> {
        self.call(Endpoint::CreateStation, |state| {
            let created = Station {
                id: StationId(state.allocate_id()),
                name: station.name().to_string(),
                location: station.location(),
            };
            state.stations.push(created.clone());
            Ok(created)
        })
        .await
    }
}

impl DriverApi for MockBackend {
    async fn create_driver(&self, driver: &NewDriver) -> Result<Driver, ServiceError> {
        self.call(Endpoint::CreateDriver, |state| {
            if state.driver_for_user(driver.user_id).is_some() {
                return Err(ServiceError::Validation {
                    message: format!("driver already exists for user {}", driver.user_id),
                });
            }
            let created = Driver {
                id: DriverId(state.allocate_id()),
                user_id: driver.user_id,
                position: driver.route.start(),
                free_seats: driver.free_seats.get(),
                route_queue: driver.route.points().to_vec(),
                is_simulating: false,
                sim_timestamp: Some(state.clock),
                matched_station: None,
                wait_counter: 0,
            };
            state.drivers.insert(created.id, created.clone());
            if state.lag_reads_after_create {
                state.lagging_reads.insert(driver.user_id);
            }
            Ok(created)
        })
        .await
    }

    async fn driver_for_user(&self, user: UserId) -> Result<Driver, ServiceError> {
        self.call(Endpoint::DriverForUser, |state| {
            if state.lagging_reads.remove(&user) {
                return Err(ServiceError::NotFound {
                    message: "Driver not found".into(),
                });
            }
            state
                .driver_for_user(user)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound {
                    message: "Driver not found".into(),
                })
        })
        .await
    }

    async fn start_simulation(&self, driver: DriverId) -> Result<(), ServiceError> {
        self.call(Endpoint::StartSimulation, |state| {
            let d = state
                .drivers
                .get_mut(&driver)
                .ok_or_else(|| ServiceError::NotFound {
                    message: "Driver not found".into(),
                })?;
            d.is_simulating = true;
            Ok(())
        })
        .await
    }

    async fn stop_simulation(&self, driver: DriverId) -> Result<(), ServiceError> {
        self.call(Endpoint::StopSimulation, |state| {
            let d = state
                .drivers
                .get_mut(&driver)
                .ok_or_else(|| ServiceError::NotFound {
                    message: "Driver not found".into(),
                })?;
            d.is_simulating = false;
            Ok(())
        })
        .await
    }

    async fn active_drivers(&self) -> Result<Vec<Driver>, ServiceError> {
        self.call(Endpoint::ActiveDrivers, |state| {
            Ok(state
                .drivers
                .values()
                .filter(|d| d.is_simulating)
                .cloned()
                .collect())
        })
        .await
    }
}

impl RiderApi for MockBackend {
    async fn create_ride(&self, ride: &NewRideRequest) -> Result<RideRequest, ServiceError> {
        self.call(Endpoint::CreateRide, |state| {
            if !state.stations.iter().any(|s| s.id == ride.station_id) {
                return Err(ServiceError::Validation {
                    message: format!("{{'station_id': ['Invalid station {}']}}", ride.station_id),
                });
            }
            let created = RideRequest {
                id: RideRequestId(state.allocate_id()),
                rider_id: ride.rider_id,
                station_id: ride.station_id,
                eta: ride.eta.to_string(),
                destination: ride.destination,
                status: RideStatus::Looking,
            };
            state.rides.insert(created.id, created.clone());
            Ok(created)
        })
        .await
    }

    async fn rides_for_rider(&self, rider: UserId) -> Result<Vec<RideRequest>, ServiceError> {
        self.call(Endpoint::RidesForRider, |state| {
            Ok(state
                .rides
                .values()
                .filter(|r| r.rider_id == rider)
                .cloned()
                .collect())
        })
        .await
    }

    async fn cancel_ride(&self, cancellation: Cancellation) -> Result<(), ServiceError> {
        self.call(Endpoint::CancelRide, |state| {
            state
                .rides
                .remove(&cancellation.id())
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound {
                    message: "Not found.".into(),
                })
        })
        .await
    }
}

impl MatchingApi for MockBackend {
    async fn matches_for_rider(&self, rider: UserId) -> Result<Vec<Match>, ServiceError> {
        self.call(Endpoint::MatchesForRider, |state| {
            Ok(state
                .matches
                .iter()
                .filter(|m| m.rider_id == rider)
                .cloned()
                .collect())
        })
        .await
    }

    async fn matches_for_driver(&self, driver: DriverId) -> Result<Vec<Match>, ServiceError> {
        self.call(Endpoint::MatchesForDriver, |state| {
            Ok(state
                .matches
                .iter()
                .filter(|m| m.driver_id == driver)
                .cloned()
                .collect())
        })
        .await
    }
}
