//! Geographic coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a coordinate is out of range or not finite.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid coordinate ({lat}, {lng}): {reason}")]
pub struct InvalidCoordinate {
    lat: f64,
    lng: f64,
    reason: &'static str,
}

/// A WGS84 latitude/longitude pair.
///
/// Serialises as `{"lat": .., "lng": ..}`, which is the waypoint shape the
/// driver service stores in its route queue.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// ```
    /// use feeder_client::domain::LatLng;
    ///
    /// assert!(LatLng::new(12.97, 77.59).is_ok());
    /// assert!(LatLng::new(91.0, 0.0).is_err());
    /// assert!(LatLng::new(0.0, f64::NAN).is_err());
    /// ```
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        let err = |reason| InvalidCoordinate { lat, lng, reason };

        if !lat.is_finite() || !lng.is_finite() {
            return Err(err("must be finite"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(err("latitude must be within -90..=90"));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(err("longitude must be within -180..=180"));
        }

        Ok(Self { lat, lng })
    }
}

impl fmt::Debug for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LatLng({}, {})", self.lat, self.lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        assert!(LatLng::new(90.0, 180.0).is_ok());
        assert!(LatLng::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(LatLng::new(-90.5, 0.0).is_err());
        assert!(LatLng::new(0.0, 180.01).is_err());
        assert!(LatLng::new(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn display_four_places() {
        let p = LatLng::new(12.97161, 77.59456).unwrap();
        assert_eq!(p.to_string(), "(12.9716, 77.5946)");
    }

    #[test]
    fn waypoint_json_shape() {
        let p: LatLng = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
        assert_eq!(p, LatLng { lat: 1.5, lng: 2.5 });
    }
}
