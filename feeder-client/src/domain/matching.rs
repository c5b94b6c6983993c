//! Rider/driver matches.

use std::fmt;
use std::str::FromStr;

use super::{DriverId, MatchId, SimTime, StationId, UserId};

/// Where a match is in the trip pipeline.
///
/// Match records are never deleted: a finished trip leaves a COMPLETED match
/// behind, so only an ACTIVE match says anything about a request that is
/// still open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "ACTIVE",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(MatchStatus::Active),
            "COMPLETED" => Ok(MatchStatus::Completed),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pairing of a rider with a driver at a station.
///
/// Matches are created by the external matcher and only ever change status
/// afterwards. The same
/// match is visible through the by-driver and the by-rider query, but the
/// two queries are not guaranteed to agree at any given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: MatchId,
    pub driver_id: DriverId,
    pub rider_id: UserId,
    pub station_id: StationId,
    /// Engine clock at formation. `None` if the matcher sent an unreadable
    /// timestamp.
    pub formed_at: Option<SimTime>,
    pub status: MatchStatus,
}

/// Drop every match keyed by `driver`, returning how many went.
///
/// Used when clearing a removed driver: everything keyed by its id goes in
/// the same step.
pub fn remove_keyed_by(matches: &mut Vec<Match>, driver: DriverId) -> usize {
    let before = matches.len();
    matches.retain(|m| m.driver_id != driver);
    before - matches.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(id: i64, driver: i64) -> Match {
        Match {
            id: MatchId(id),
            driver_id: DriverId(driver),
            rider_id: UserId(1),
            station_id: StationId(1),
            formed_at: None,
            status: MatchStatus::Active,
        }
    }

    #[test]
    fn drops_only_matching_driver() {
        let mut matches = vec![m(1, 7), m(2, 8), m(3, 7)];
        assert_eq!(remove_keyed_by(&mut matches, DriverId(7)), 2);
        assert_eq!(matches, vec![m(2, 8)]);
    }

    #[test]
    fn status_parse() {
        assert_eq!("ACTIVE".parse(), Ok(MatchStatus::Active));
        assert_eq!("COMPLETED".parse(), Ok(MatchStatus::Completed));
        assert_eq!("CANCELLED".parse(), Ok(MatchStatus::Cancelled));
        assert_eq!("active".parse::<MatchStatus>(), Err(()));
    }
}
