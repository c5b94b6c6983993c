//! Wire DTOs for the backend services.
//!
//! Every service wraps its payload in an envelope with a `success` flag and,
//! on failure, a human-readable `message`. The payload fields sit next to
//! `success` at the top level, so each response gets its own struct.
//! Fields the client never reads are left out.

use serde::{Deserialize, Serialize};

/// Error envelope: `{"success": false, "message": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub message: Option<String>,
}

// ---- identity ----

#[derive(Debug, Clone, Serialize)]
pub struct LoginBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterBody<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: Option<String>,
    pub user_id: Option<i64>,
}

// ---- stations ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDto {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationListResponse {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub stations: Vec<StationDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateStationBody<'a> {
    pub name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStationResponse {
    pub success: bool,
    pub message: Option<String>,
    pub station_id: Option<i64>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ---- drivers ----

/// Waypoint as stored in the driver's route queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaypointDto {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverDto {
    pub id: i64,
    pub user_id: i64,
    pub current_lat: f64,
    pub current_lng: f64,
    pub free_seats: i64,
    #[serde(default)]
    pub route_queue: Vec<WaypointDto>,
    pub sim_timestamp: Option<String>,
    #[serde(default)]
    pub is_simulating: bool,
    pub matched_station_id: Option<i64>,
    #[serde(default)]
    pub wait_counter: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverResponse {
    pub success: bool,
    pub message: Option<String>,
    pub driver: Option<DriverDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverListResponse {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub drivers: Vec<DriverDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDriverBody<'a> {
    pub user_id: i64,
    pub free_seats: u8,
    pub route: &'a [WaypointDto],
}

/// Create returns a flattened subset of the driver under different keys.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDriverResponse {
    pub success: bool,
    pub message: Option<String>,
    pub driver_id: Option<i64>,
    pub user_id: Option<i64>,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    #[serde(default)]
    pub route_queue: Vec<WaypointDto>,
}

/// `{"success": true, "message": "Simulation started"}`
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: Option<String>,
}

// ---- rides ----

#[derive(Debug, Clone, Deserialize)]
pub struct RideDto {
    pub id: i64,
    pub rider_id: i64,
    pub station_id: i64,
    pub eta: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RideListResponse {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub rides: Vec<RideDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRideBody {
    pub rider_id: i64,
    pub station_id: i64,
    pub eta: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRideResponse {
    pub success: bool,
    pub message: Option<String>,
    pub ride_request_id: Option<i64>,
    pub status: Option<String>,
}

// ---- matches ----

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDto {
    pub id: i64,
    pub rider_id: i64,
    pub driver_id: i64,
    pub station_id: i64,
    pub match_timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchListResponse {
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub matches: Vec<MatchDto>,
}
