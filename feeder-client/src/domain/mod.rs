//! Domain types for the metro feeder client.
//!
//! These are the client-side projections of entities owned by the backend
//! services, plus the lifecycle rules this client enforces on them. Input
//! types validate at construction time, so code that receives a `Route` or
//! a `NewRideRequest` can trust it without re-checking.

mod driver;
mod error;
mod geo;
mod ids;
mod matching;
mod ride;
mod role;
mod sim_time;
mod station;

pub use driver::{
    Anomaly, DEFAULT_FREE_SEATS, Driver, DriverState, DriverTransition, FreeSeats,
    MAX_FREE_SEATS, MIN_FREE_SEATS, MIN_ROUTE_POINTS, NewDriver, Observation, Route,
};
pub use error::{DomainError, NotPermitted};
pub use geo::{InvalidCoordinate, LatLng};
pub use ids::{DriverId, MatchId, RideRequestId, StationId, UserId};
pub use matching::{Match, MatchStatus, remove_keyed_by};
pub use ride::{Cancellation, NewRideRequest, RideRequest, RideStatus};
pub use role::Role;
pub use sim_time::{SimTime, TimeError};
pub use station::{NewStation, Station, station_name};
