//! Clients for the backend entity stores.
//!
//! Five services own the data this client displays: identity, stations,
//! riders, drivers and matches. Each gets a trait here so dashboards can be
//! driven by either [`HttpBackend`] (the real services) or [`MockBackend`]
//! (in memory, for tests and offline demos).
//!
//! All methods return domain types. A missing entity is reported as
//! [`ServiceError::NotFound`], never as an empty value, because not-found is
//! what drives lifecycle clearing in the dashboards.

use std::future::Future;

use crate::domain::{
    Cancellation, Driver, DriverId, Match, NewDriver, NewRideRequest, NewStation, RideRequest,
    Role, Station, UserId,
};
use crate::session::Session;

mod cache;
mod client;
mod convert;
mod error;
mod http;
mod mock;
mod types;

pub use cache::StationCache;
pub use client::ServiceClient;
pub use convert::ConversionError;
pub use error::{ErrorClass, ServiceError};
pub use http::HttpBackend;
pub use mock::{Endpoint, MockBackend, MockFailure};

/// Details for a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub trait IdentityApi: Send + Sync {
    /// Exchange credentials for a session.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, ServiceError>> + Send;

    /// Create an account. Does not log in.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<UserId, ServiceError>> + Send;
}

pub trait StationApi: Send + Sync {
    /// The station list. Implementations may serve it from a cache.
    fn list_stations(&self) -> impl Future<Output = Result<Vec<Station>, ServiceError>> + Send;

    /// The station list, bypassing any cache.
    fn refresh_stations(&self) -> impl Future<Output = Result<Vec<Station>, ServiceError>> + Send {
        self.list_stations()
    }

    fn create_station(
        &self,
        station: &NewStation,
    ) -> impl Future<Output = Result<Station, ServiceError>> + Send;
}

pub trait DriverApi: Send + Sync {
    /// Register a driver. The returned driver is built from the create
    /// response, which omits the engine clock and seat count.
    fn create_driver(
        &self,
        driver: &NewDriver,
    ) -> impl Future<Output = Result<Driver, ServiceError>> + Send;

    /// The driver registered by `user`, or `NotFound`.
    fn driver_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Driver, ServiceError>> + Send;

    fn start_simulation(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn stop_simulation(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Drivers currently simulating.
    fn active_drivers(&self) -> impl Future<Output = Result<Vec<Driver>, ServiceError>> + Send;
}

pub trait RiderApi: Send + Sync {
    fn create_ride(
        &self,
        ride: &NewRideRequest,
    ) -> impl Future<Output = Result<RideRequest, ServiceError>> + Send;

    fn rides_for_rider(
        &self,
        rider: UserId,
    ) -> impl Future<Output = Result<Vec<RideRequest>, ServiceError>> + Send;

    /// Withdraw a request. Only a [`Cancellation`] can be withdrawn, so a
    /// request that was not LOOKING in the caller's view never reaches the
    /// service.
    fn cancel_ride(
        &self,
        cancellation: Cancellation,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

pub trait MatchingApi: Send + Sync {
    fn matches_for_rider(
        &self,
        rider: UserId,
    ) -> impl Future<Output = Result<Vec<Match>, ServiceError>> + Send;

    fn matches_for_driver(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = Result<Vec<Match>, ServiceError>> + Send;
}

/// Everything a dashboard needs.
pub trait Backend:
    IdentityApi + StationApi + DriverApi + RiderApi + MatchingApi + 'static
{
}

impl<T> Backend for T where
    T: IdentityApi + StationApi + DriverApi + RiderApi + MatchingApi + 'static
{
}
