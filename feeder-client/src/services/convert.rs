//! Conversion from wire DTOs to domain types.
//!
//! Conversion is strict about identity and coordinates, since a projection
//! built on a bad id is worse than a skipped poll. Cosmetic fields such as
//! clock strings are lenient: an unreadable value becomes `None`.

use crate::domain::{
    Driver, DriverId, LatLng, Match, MatchId, RideRequest, RideRequestId, RideStatus, SimTime,
    Station, StationId, UserId,
};

use super::types::{DriverDto, MatchDto, RideDto, StationDto, WaypointDto};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid coordinate in {entity} {id}: {message}")]
    InvalidCoordinate {
        entity: &'static str,
        id: i64,
        message: String,
    },

    #[error("invalid ride status {status:?} on ride {id}")]
    InvalidStatus { id: i64, status: String },

    #[error("free seats out of range on driver {id}: {seats}")]
    InvalidSeats { id: i64, seats: i64 },

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

fn coordinate(
    entity: &'static str,
    id: i64,
    lat: f64,
    lng: f64,
) -> Result<LatLng, ConversionError> {
    LatLng::new(lat, lng).map_err(|e| ConversionError::InvalidCoordinate {
        entity,
        id,
        message: e.to_string(),
    })
}

pub fn convert_station(dto: &StationDto) -> Result<Station, ConversionError> {
    Ok(Station {
        id: StationId(dto.id),
        name: dto.name.clone(),
        location: coordinate("station", dto.id, dto.latitude, dto.longitude)?,
    })
}

pub fn convert_waypoints(
    id: i64,
    points: &[WaypointDto],
) -> Result<Vec<LatLng>, ConversionError> {
    points
        .iter()
        .map(|p| coordinate("driver route", id, p.lat, p.lng))
        .collect()
}

pub fn convert_driver(dto: &DriverDto) -> Result<Driver, ConversionError> {
    let free_seats = u8::try_from(dto.free_seats).map_err(|_| ConversionError::InvalidSeats {
        id: dto.id,
        seats: dto.free_seats,
    })?;

    Ok(Driver {
        id: DriverId(dto.id),
        user_id: UserId(dto.user_id),
        position: coordinate("driver", dto.id, dto.current_lat, dto.current_lng)?,
        free_seats,
        route_queue: convert_waypoints(dto.id, &dto.route_queue)?,
        is_simulating: dto.is_simulating,
        sim_timestamp: dto
            .sim_timestamp
            .as_deref()
            .and_then(|s| SimTime::parse_hhmm(s).ok()),
        matched_station: dto.matched_station_id.map(StationId),
        wait_counter: u32::try_from(dto.wait_counter).unwrap_or(0),
    })
}

pub fn convert_ride(dto: &RideDto) -> Result<RideRequest, ConversionError> {
    let status: RideStatus = dto
        .status
        .parse()
        .map_err(|_| ConversionError::InvalidStatus {
            id: dto.id,
            status: dto.status.clone(),
        })?;

    Ok(RideRequest {
        id: RideRequestId(dto.id),
        rider_id: UserId(dto.rider_id),
        station_id: StationId(dto.station_id),
        eta: dto.eta.clone(),
        destination: coordinate("ride", dto.id, dto.destination_lat, dto.destination_lng)?,
        status,
    })
}

pub fn convert_match(dto: &MatchDto) -> Match {
    Match {
        id: MatchId(dto.id),
        driver_id: DriverId(dto.driver_id),
        rider_id: UserId(dto.rider_id),
        station_id: StationId(dto.station_id),
        formed_at: dto
            .match_timestamp
            .as_deref()
            .and_then(|s| SimTime::parse_hhmm(s).ok()),
        // older matcher builds leave the status out; the column defaults to ACTIVE
        status: dto
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
    }
}

/// Convert a whole list, failing on the first bad entry.
///
/// A list snapshot replaces the cached one wholesale, so a partially
/// converted list would silently drop entities from the view.
pub fn convert_all<D, T>(
    items: &[D],
    convert: impl Fn(&D) -> Result<T, ConversionError>,
) -> Result<Vec<T>, ConversionError> {
    items.iter().map(convert).collect()
}
