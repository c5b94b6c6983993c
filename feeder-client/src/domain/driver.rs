//! Driver records and the driver lifecycle.
//!
//! A driver is registered with a route, started and stopped by its owner, and
//! advanced by an external simulation engine that pops waypoints off the
//! front of the route queue. When the queue runs dry the engine stops the
//! driver and the driver service deletes it, so the owner only ever learns
//! about completion indirectly: first a snapshot with an empty queue and
//! `is_simulating == false`, then a not-found.

use super::{DomainError, DriverId, LatLng, SimTime, StationId, UserId};

/// Minimum number of waypoints in a driver route.
pub const MIN_ROUTE_POINTS: usize = 2;

/// Seat count bounds accepted when registering.
pub const MIN_FREE_SEATS: i64 = 1;
pub const MAX_FREE_SEATS: i64 = 8;

/// Seat count used when the owner does not pick one.
pub const DEFAULT_FREE_SEATS: u8 = 4;

/// A driver as last reported by the driver service.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub id: DriverId,
    pub user_id: UserId,
    pub position: LatLng,
    pub free_seats: u8,
    /// Remaining waypoints, next one first.
    pub route_queue: Vec<LatLng>,
    pub is_simulating: bool,
    /// Engine clock. Absent only on the record returned by a create call.
    pub sim_timestamp: Option<SimTime>,
    /// Station the engine is detouring to for a pickup, if any.
    pub matched_station: Option<StationId>,
    /// Ticks spent waiting at the matched station.
    pub wait_counter: u32,
}

impl Driver {
    /// Empty queue and not simulating: the engine is done with this driver
    /// and the service will delete it.
    pub fn is_route_complete(&self) -> bool {
        self.route_queue.is_empty() && !self.is_simulating
    }
}

/// An ordered list of at least [`MIN_ROUTE_POINTS`] waypoints.
///
/// The waypoints are sent verbatim; no reordering or smoothing happens here.
#[derive(Debug, Clone, PartialEq)]
pub struct Route(Vec<LatLng>);

impl Route {
    pub fn new(points: Vec<LatLng>) -> Result<Self, DomainError> {
        if points.len() < MIN_ROUTE_POINTS {
            return Err(DomainError::RouteTooShort {
                points: points.len(),
            });
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[LatLng] {
        &self.0
    }

    pub fn start(&self) -> LatLng {
        // non-empty by construction
        self.0[0]
    }
}

/// Validated seat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSeats(u8);

impl FreeSeats {
    pub fn new(n: i64) -> Result<Self, DomainError> {
        if !(MIN_FREE_SEATS..=MAX_FREE_SEATS).contains(&n) {
            return Err(DomainError::SeatsOutOfRange(n));
        }
        Ok(Self(n as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for FreeSeats {
    fn default() -> Self {
        Self(DEFAULT_FREE_SEATS)
    }
}

/// Everything needed to register a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDriver {
    pub user_id: UserId,
    pub free_seats: FreeSeats,
    pub route: Route,
}

impl NewDriver {
    /// Validate raw input. Fails before any write call can be issued.
    pub fn new(
        user_id: UserId,
        free_seats: i64,
        waypoints: Vec<LatLng>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            user_id,
            free_seats: FreeSeats::new(free_seats)?,
            route: Route::new(waypoints)?,
        })
    }
}

/// Where a user's driver record is in its lifecycle, as far as this client
/// can tell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DriverState {
    /// No driver record is known for the user.
    #[default]
    Unregistered,
    /// Registered and parked.
    Idle(Driver),
    /// The engine is advancing this driver.
    Simulating(Driver),
    /// A previously known driver vanished from the service. Normally this
    /// is the end of a completed route.
    Removed { last: DriverId },
}

/// What changed when a fresh snapshot was folded into a [`DriverState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTransition {
    /// First sighting, or a re-registration after removal.
    Registered,
    Started,
    Stopped,
    /// Still simulating; the queue or position moved.
    Progressed,
    /// The snapshot is route-complete. A not-found is expected next.
    RouteCompleted,
    Unchanged,
}

impl DriverState {
    /// Classify a snapshot on its own.
    pub fn from_snapshot(driver: Driver) -> Self {
        if driver.is_simulating {
            DriverState::Simulating(driver)
        } else {
            DriverState::Idle(driver)
        }
    }

    /// The current driver, if one is known.
    pub fn driver(&self) -> Option<&Driver> {
        match self {
            DriverState::Idle(d) | DriverState::Simulating(d) => Some(d),
            DriverState::Unregistered | DriverState::Removed { .. } => None,
        }
    }

    pub fn driver_id(&self) -> Option<DriverId> {
        self.driver().map(|d| d.id)
    }

    pub fn is_known(&self) -> bool {
        self.driver().is_some()
    }

    /// The last snapshot said the route is complete; the record may
    /// disappear at any moment and a not-found is not an anomaly.
    pub fn is_eligible_for_removal(&self) -> bool {
        matches!(self, DriverState::Idle(d) if d.is_route_complete())
    }

    /// Replace the state with a fresh snapshot and report the transition.
    ///
    /// The snapshot always wins. Oddities such as a queue that grew while
    /// simulating are reported through the returned [`Observation`] so the
    /// caller can log them, but never block the replace.
    pub fn observe(&mut self, snapshot: Driver) -> Observation {
        let mut anomalies = Vec::new();

        let transition = match self.driver() {
            None => {
                if snapshot.is_route_complete() {
                    DriverTransition::RouteCompleted
                } else {
                    DriverTransition::Registered
                }
            }
            Some(prev) if prev.id != snapshot.id => DriverTransition::Registered,
            Some(prev) => {
                if prev.is_simulating && snapshot.is_simulating {
                    if snapshot.route_queue.len() > prev.route_queue.len() {
                        anomalies.push(Anomaly::QueueGrew {
                            from: prev.route_queue.len(),
                            to: snapshot.route_queue.len(),
                        });
                    }
                    if let (Some(before), Some(now)) = (prev.sim_timestamp, snapshot.sim_timestamp)
                        && now.regressed_from(&before)
                    {
                        anomalies.push(Anomaly::ClockRegressed { from: before, to: now });
                    }
                }

                match (prev.is_simulating, snapshot.is_simulating) {
                    (_, false) if snapshot.is_route_complete() && !prev.is_route_complete() => {
                        DriverTransition::RouteCompleted
                    }
                    (false, true) => DriverTransition::Started,
                    (true, false) => DriverTransition::Stopped,
                    _ if *prev == snapshot => DriverTransition::Unchanged,
                    (true, true) => DriverTransition::Progressed,
                    (false, false) => DriverTransition::Unchanged,
                }
            }
        };

        *self = DriverState::from_snapshot(snapshot);
        Observation {
            transition,
            anomalies,
        }
    }

    /// The driver service answered not-found.
    ///
    /// A known driver moves to [`DriverState::Removed`] and its id is
    /// returned so everything keyed by it can be cleared in the same step.
    /// If no driver was known there is nothing to clear.
    pub fn mark_removed(&mut self) -> Option<DriverId> {
        let id = self.driver_id()?;
        *self = DriverState::Removed { last: id };
        Some(id)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DriverState::Unregistered => "UNREGISTERED",
            DriverState::Idle(_) => "IDLE",
            DriverState::Simulating(_) => "SIMULATING",
            DriverState::Removed { .. } => "COMPLETED-AND-REMOVED",
        }
    }
}

/// Result of [`DriverState::observe`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub transition: DriverTransition,
    pub anomalies: Vec<Anomaly>,
}

/// Snapshot sequences that break the engine's stated invariants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anomaly {
    QueueGrew { from: usize, to: usize },
    ClockRegressed { from: SimTime, to: SimTime },
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn waypoint() -> impl Strategy<Value = LatLng> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| LatLng { lat, lng })
    }

    proptest! {
        /// Routes are accepted exactly when they have two or more points,
        /// and accepted routes keep their waypoints in order.
        #[test]
        fn route_length_rule(points in proptest::collection::vec(waypoint(), 0..6)) {
            match Route::new(points.clone()) {
                Ok(route) => {
                    prop_assert!(points.len() >= MIN_ROUTE_POINTS);
                    prop_assert_eq!(route.points(), points.as_slice());
                }
                Err(DomainError::RouteTooShort { points: n }) => {
                    prop_assert!(n < MIN_ROUTE_POINTS);
                    prop_assert_eq!(n, points.len());
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        #[test]
        fn seats_rule(n in -5i64..15) {
            prop_assert_eq!(FreeSeats::new(n).is_ok(), (1..=8).contains(&n));
        }
    }
}
