//! The real backend: five REST services sharing one connection pool.

use std::time::Duration;

use tracing::debug;

use crate::config::FeederConfig;
use crate::domain::{
    Cancellation, Driver, DriverId, LatLng, Match, NewDriver, NewRideRequest, NewStation,
    RideRequest, RideStatus, Role, Station, StationId, UserId,
};
use crate::session::Session;

use super::cache::StationCache;
use super::client::{ServiceClient, check_envelope};
use super::convert::{
    ConversionError, convert_all, convert_driver, convert_match, convert_ride, convert_station,
    convert_waypoints,
};
use super::error::ServiceError;
use super::types::{
    AckResponse, CreateDriverBody, CreateDriverResponse, CreateRideBody, CreateRideResponse,
    CreateStationBody, CreateStationResponse, DriverListResponse, DriverResponse, LoginBody,
    LoginResponse, MatchListResponse, RegisterBody, RegisterResponse, RideListResponse,
    StationListResponse, WaypointDto,
};
use super::{DriverApi, IdentityApi, MatchingApi, Registration, RiderApi, StationApi};

impl From<ConversionError> for ServiceError {
    fn from(e: ConversionError) -> Self {
        ServiceError::Json {
            message: e.to_string(),
            body: None,
        }
    }
}

/// HTTP implementation of every service trait.
pub struct HttpBackend {
    identity: ServiceClient,
    stations: ServiceClient,
    riders: ServiceClient,
    drivers: ServiceClient,
    matching: ServiceClient,
    station_cache: StationCache,
}

impl HttpBackend {
    pub fn new(config: &FeederConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let endpoints = &config.endpoints;
        Ok(Self {
            identity: ServiceClient::new(http.clone(), &endpoints.identity),
            stations: ServiceClient::new(http.clone(), &endpoints.station),
            riders: ServiceClient::new(http.clone(), &endpoints.rider),
            drivers: ServiceClient::new(http.clone(), &endpoints.driver),
            matching: ServiceClient::new(http, &endpoints.matching),
            station_cache: StationCache::new(config.station_ttl),
        })
    }

    async fn fetch_stations(&self) -> Result<Vec<Station>, ServiceError> {
        let resp: StationListResponse = self.stations.get("/stations/", &[]).await?;
        check_envelope(resp.success, resp.message)?;
        let stations = convert_all(&resp.stations, convert_station)?;

        let cached = self.station_cache.insert(stations).await;
        Ok(cached.as_ref().clone())
    }
}

impl IdentityApi for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<Session, ServiceError> {
        let resp: LoginResponse = self
            .identity
            .post("/users/login/", &LoginBody { username, password })
            .await?;
        check_envelope(resp.success, resp.message)?;

        let user_id = resp.user_id.ok_or(ConversionError::MissingField("user_id"))?;
        let role = resp
            .role
            .as_deref()
            .ok_or(ConversionError::MissingField("role"))?
            .parse::<Role>()
            .map_err(|e| ServiceError::Json {
                message: e.to_string(),
                body: None,
            })?;

        Ok(Session {
            user_id: UserId(user_id),
            username: resp.username.unwrap_or_else(|| username.to_string()),
            role,
            token: resp.token.unwrap_or_default(),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<UserId, ServiceError> {
        let body = RegisterBody {
            username: &registration.username,
            email: &registration.email,
            password: &registration.password,
            role: registration.role.as_str(),
        };
        let resp: RegisterResponse = self.identity.post("/users/", &body).await?;
        check_envelope(resp.success, resp.message)?;

        Ok(UserId(
            resp.user_id.ok_or(ConversionError::MissingField("user_id"))?,
        ))
    }
}

impl StationApi for HttpBackend {
    async fn list_stations(&self) -> Result<Vec<Station>, ServiceError> {
        if let Some(cached) = self.station_cache.get().await {
            return Ok(cached.as_ref().clone());
        }
        self.fetch_stations().await
    }

    async fn refresh_stations(&self) -> Result<Vec<Station>, ServiceError> {
        self.fetch_stations().await
    }

    async fn create_station(&self, station: &NewStation) -> Result<Station, ServiceError> {
        let location = station.location();
        let body = CreateStationBody {
            name: station.name(),
            latitude: location.lat,
            longitude: location.lng,
        };
        let resp: CreateStationResponse = self.stations.post("/stations/", &body).await?;
        check_envelope(resp.success, resp.message)?;
        self.station_cache.invalidate().await;

        let id = resp
            .station_id
            .ok_or(ConversionError::MissingField("station_id"))?;
        let location = match (resp.latitude, resp.longitude) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng).unwrap_or(location),
            _ => location,
        };
        Ok(Station {
            id: StationId(id),
            name: resp.name.unwrap_or_else(|| station.name().to_string()),
            location,
        })
    }
}

impl DriverApi for HttpBackend {
    async fn create_driver(&self, driver: &NewDriver) -> Result<Driver, ServiceError> {
        let route: Vec<WaypointDto> = driver
            .route
            .points()
            .iter()
            .map(|p| WaypointDto { lat: p.lat, lng: p.lng })
            .collect();
        let body = CreateDriverBody {
            user_id: driver.user_id.get(),
            free_seats: driver.free_seats.get(),
            route: &route,
        };
        let resp: CreateDriverResponse = self.drivers.post("/drivers/", &body).await?;
        check_envelope(resp.success, resp.message)?;

        let id = resp
            .driver_id
            .ok_or(ConversionError::MissingField("driver_id"))?;
        let position = match (resp.current_lat, resp.current_lng) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng).unwrap_or(driver.route.start()),
            _ => driver.route.start(),
        };
        let route_queue = if resp.route_queue.is_empty() {
            driver.route.points().to_vec()
        } else {
            convert_waypoints(id, &resp.route_queue)?
        };

        Ok(Driver {
            id: DriverId(id),
            user_id: resp.user_id.map(UserId).unwrap_or(driver.user_id),
            position,
            free_seats: driver.free_seats.get(),
            route_queue,
            is_simulating: false,
            sim_timestamp: None,
            matched_station: None,
            wait_counter: 0,
        })
    }

    async fn driver_for_user(&self, user: UserId) -> Result<Driver, ServiceError> {
        let resp: DriverResponse = self
            .drivers
            .get("/drivers/by_user/", &[("user_id", user.to_string())])
            .await?;
        check_envelope(resp.success, resp.message)?;

        let dto = resp.driver.ok_or_else(|| ServiceError::NotFound {
            message: format!("no driver for user {user}"),
        })?;
        Ok(convert_driver(&dto)?)
    }

    async fn start_simulation(&self, driver: DriverId) -> Result<(), ServiceError> {
        let resp: AckResponse = self
            .drivers
            .post_empty(&format!("/drivers/{driver}/start_simulation/"))
            .await?;
        check_envelope(resp.success, resp.message)
    }

    async fn stop_simulation(&self, driver: DriverId) -> Result<(), ServiceError> {
        let resp: AckResponse = self
            .drivers
            .post_empty(&format!("/drivers/{driver}/stop_simulation/"))
            .await?;
        check_envelope(resp.success, resp.message)
    }

    async fn active_drivers(&self) -> Result<Vec<Driver>, ServiceError> {
        let resp: DriverListResponse = self.drivers.get("/drivers/active_drivers/", &[]).await?;
        check_envelope(resp.success, resp.message)?;
        Ok(convert_all(&resp.drivers, convert_driver)?)
    }
}

impl RiderApi for HttpBackend {
    async fn create_ride(&self, ride: &NewRideRequest) -> Result<RideRequest, ServiceError> {
        let body = CreateRideBody {
            rider_id: ride.rider_id.get(),
            station_id: ride.station_id.get(),
            eta: ride.eta.to_string(),
            destination_lat: ride.destination.lat,
            destination_lng: ride.destination.lng,
        };
        let resp: CreateRideResponse = self.riders.post("/rides/", &body).await?;
        check_envelope(resp.success, resp.message)?;

        let id = resp
            .ride_request_id
            .ok_or(ConversionError::MissingField("ride_request_id"))?;
        let status = resp
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(RideStatus::Looking);

        Ok(RideRequest {
            id: id.into(),
            rider_id: ride.rider_id,
            station_id: ride.station_id,
            eta: ride.eta.to_string(),
            destination: ride.destination,
            status,
        })
    }

    async fn rides_for_rider(&self, rider: UserId) -> Result<Vec<RideRequest>, ServiceError> {
        let resp: RideListResponse = self
            .riders
            .get("/rides/by_rider/", &[("rider_id", rider.to_string())])
            .await?;
        check_envelope(resp.success, resp.message)?;
        Ok(convert_all(&resp.rides, convert_ride)?)
    }

    async fn cancel_ride(&self, cancellation: Cancellation) -> Result<(), ServiceError> {
        debug!(ride = %cancellation.id(), "withdrawing ride request");
        self.riders
            .delete(&format!("/rides/{}/", cancellation.id()))
            .await
    }
}

impl MatchingApi for HttpBackend {
    async fn matches_for_rider(&self, rider: UserId) -> Result<Vec<Match>, ServiceError> {
        let resp: MatchListResponse = self
            .matching
            .get("/matches/by_rider/", &[("rider_id", rider.to_string())])
            .await?;
        check_envelope(resp.success, resp.message)?;
        Ok(resp.matches.iter().map(convert_match).collect())
    }

    async fn matches_for_driver(&self, driver: DriverId) -> Result<Vec<Match>, ServiceError> {
        let resp: MatchListResponse = self
            .matching
            .get("/matches/by_driver/", &[("driver_id", driver.to_string())])
            .await?;
        check_envelope(resp.success, resp.message)?;
        Ok(resp.matches.iter().map(convert_match).collect())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
