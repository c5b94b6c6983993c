//! Domain error types.
//!
//! `DomainError` covers input that can be rejected locally before any write
//! call is issued. `NotPermitted` covers intents the acting role's lifecycle
//! does not allow; those are refused by construction rather than left to the
//! owning service.

use super::{DriverId, InvalidCoordinate, RideRequestId, RideStatus, Role, StationId, TimeError};

/// Local validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// A driver route needs a start and at least one more waypoint
    #[error("route needs at least 2 points, got {points}")]
    RouteTooShort { points: usize },

    #[error("free seats must be between 1 and 8, got {0}")]
    SeatsOutOfRange(i64),

    #[error("ETA is required")]
    EmptyEta,

    #[error("ETA must be HH:MM: {0}")]
    InvalidEta(#[from] TimeError),

    #[error("station {0} does not exist")]
    UnknownStation(StationId),

    #[error("station name is required")]
    EmptyStationName,

    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinate),

    /// Status string the rider service reported that this client does not know
    #[error("unknown ride status: {0}")]
    UnknownRideStatus(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Intents refused because the current lifecycle state or role forbids them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotPermitted {
    #[error("ride request {id} is {status} and can no longer be cancelled")]
    CancelNotLooking { id: RideRequestId, status: RideStatus },

    #[error("ride request {0} is not in the current view")]
    UnknownRideRequest(RideRequestId),

    #[error("this action requires the {required} role, session is {actual}")]
    WrongRole { required: Role, actual: Role },

    #[error("no driver is registered for this user")]
    NoDriver,

    #[error("driver {0} is already registered")]
    DriverExists(DriverId),

    #[error("not logged in")]
    SignedOut,
}
