//! Metro stations.

use super::{DomainError, LatLng, StationId};

/// A metro station riders can be dropped at or picked up from.
///
/// Stations are immutable once created and are never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub location: LatLng,
}

/// Validated input for creating a station.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStation {
    name: String,
    location: LatLng,
}

impl NewStation {
    /// The name is trimmed; an empty name is rejected.
    pub fn new(name: &str, lat: f64, lng: f64) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyStationName);
        }
        let location = LatLng::new(lat, lng)?;
        Ok(Self {
            name: name.to_string(),
            location,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> LatLng {
        self.location
    }
}

/// Resolve a station id to a display name.
///
/// Falls back to `Station {id}` when the id is not in the list, which happens
/// when a station was created after the list was last fetched.
pub fn station_name(stations: &[Station], id: StationId) -> String {
    stations
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("Station {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: i64, name: &str) -> Station {
        Station {
            id: StationId(id),
            name: name.to_string(),
            location: LatLng::new(12.9, 77.6).unwrap(),
        }
    }

    #[test]
    fn new_station_trims_name() {
        let s = NewStation::new("  MG Road ", 12.97, 77.6).unwrap();
        assert_eq!(s.name(), "MG Road");
    }

    #[test]
    fn new_station_requires_name() {
        assert_eq!(
            NewStation::new("   ", 12.97, 77.6),
            Err(DomainError::EmptyStationName)
        );
    }

    #[test]
    fn new_station_rejects_bad_coordinate() {
        assert!(matches!(
            NewStation::new("X", 200.0, 0.0),
            Err(DomainError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn name_lookup_with_fallback() {
        let stations = vec![station(1, "Indiranagar"), station(2, "Trinity")];
        assert_eq!(station_name(&stations, StationId(2)), "Trinity");
        assert_eq!(station_name(&stations, StationId(9)), "Station 9");
    }
}
