//! Ride requests and their lifecycle.
//!
//! A request starts out LOOKING. The rider may withdraw it while it is still
//! LOOKING; otherwise it only moves when the matching service pairs it with
//! a driver, which this client learns about by seeing a match for the rider.

use std::fmt;
use std::str::FromStr;

use super::{
    DomainError, LatLng, Match, MatchStatus, NotPermitted, RideRequestId, SimTime, StationId,
    UserId,
};

/// Ride request status as reported by the rider service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RideStatus {
    Looking,
    Matched,
    Cancelled,
    /// Set by the trip pipeline once the ride is over.
    Completed,
}

impl RideStatus {
    /// Nothing this client does can move a request out of a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RideStatus::Looking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Looking => "LOOKING",
            RideStatus::Matched => "MATCHED",
            RideStatus::Cancelled => "CANCELLED",
            RideStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for RideStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOOKING" => Ok(RideStatus::Looking),
            "MATCHED" => Ok(RideStatus::Matched),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            "COMPLETED" => Ok(RideStatus::Completed),
            other => Err(DomainError::UnknownRideStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ride request as last reported by the rider service.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRequest {
    pub id: RideRequestId,
    pub rider_id: UserId,
    pub station_id: StationId,
    /// Rider-declared arrival time at the station, kept verbatim.
    pub eta: String,
    pub destination: LatLng,
    pub status: RideStatus,
}

impl RideRequest {
    /// Status to show, folding in matches the rider service may not reflect
    /// yet.
    ///
    /// The rider and matching services are polled separately and can
    /// disagree for a while, so an ACTIVE match at this request's station
    /// is taken as evidence the request left LOOKING. Match records outlive
    /// the requests they were formed for, so each match accounts for at
    /// most one request: the rider's requests at this station that the
    /// rider service already reports MATCHED or COMPLETED claim the oldest
    /// matches, and whatever ACTIVE matches remain go to the LOOKING
    /// requests oldest first. `rides` is the rider's request list; `self`
    /// need not be in it.
    pub fn effective_status(&self, rides: &[RideRequest], matches: &[Match]) -> RideStatus {
        if self.status != RideStatus::Looking {
            return self.status;
        }

        let mut here: Vec<&Match> = matches
            .iter()
            .filter(|m| self.is_at_station_of(m) && m.status != MatchStatus::Cancelled)
            .collect();
        here.sort_by_key(|m| m.id);

        let siblings = rides
            .iter()
            .filter(|r| r.id != self.id)
            .filter(|r| r.rider_id == self.rider_id && r.station_id == self.station_id);
        let mut claimed = 0;
        let mut looking_ahead = 0;
        for r in siblings {
            match r.status {
                RideStatus::Matched | RideStatus::Completed => claimed += 1,
                RideStatus::Looking if r.id < self.id => looking_ahead += 1,
                _ => {}
            }
        }

        let unclaimed_active = here
            .iter()
            .skip(claimed)
            .filter(|m| m.status == MatchStatus::Active)
            .count();
        if looking_ahead < unclaimed_active {
            RideStatus::Matched
        } else {
            RideStatus::Looking
        }
    }

    /// Same rider, same station. Says nothing about which of the rider's
    /// requests there the match was formed for.
    pub fn is_at_station_of(&self, m: &Match) -> bool {
        m.rider_id == self.rider_id && m.station_id == self.station_id
    }

    /// Permission to withdraw this request.
    ///
    /// Only a LOOKING request can be cancelled. `rides` and `matches` are
    /// the rider's latest lists, so that a request the matcher already
    /// claimed is refused even while the rider service still says LOOKING.
    pub fn cancellation(
        &self,
        rides: &[RideRequest],
        matches: &[Match],
    ) -> Result<Cancellation, NotPermitted> {
        match self.effective_status(rides, matches) {
            RideStatus::Looking => Ok(Cancellation { id: self.id }),
            status => Err(NotPermitted::CancelNotLooking {
                id: self.id,
                status,
            }),
        }
    }
}

/// Proof that a request was LOOKING in the view it was taken from.
///
/// The rider dashboard only issues a delete call for a `Cancellation`, and
/// the only way to get one is [`RideRequest::cancellation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation {
    id: RideRequestId,
}

impl Cancellation {
    pub fn id(&self) -> RideRequestId {
        self.id
    }
}

/// Validated input for a new ride request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRideRequest {
    pub rider_id: UserId,
    pub station_id: StationId,
    pub eta: SimTime,
    pub destination: LatLng,
}

impl NewRideRequest {
    /// Check the ETA and destination. Station existence is checked by the
    /// caller against its station list.
    pub fn new(
        rider_id: UserId,
        station_id: StationId,
        eta: &str,
        destination: (f64, f64),
    ) -> Result<Self, DomainError> {
        let eta = eta.trim();
        if eta.is_empty() {
            return Err(DomainError::EmptyEta);
        }
        let eta = SimTime::parse_hhmm(eta)?;
        let destination = LatLng::new(destination.0, destination.1)?;

        Ok(Self {
            rider_id,
            station_id,
            eta,
            destination,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{DriverId, MatchId};
    use proptest::prelude::*;

    fn status() -> impl Strategy<Value = RideStatus> {
        prop_oneof![
            Just(RideStatus::Looking),
            Just(RideStatus::Matched),
            Just(RideStatus::Cancelled),
            Just(RideStatus::Completed),
        ]
    }

    proptest! {
        /// A cancellation is granted exactly when the effective status is
        /// LOOKING, whatever the mix of matches in view.
        #[test]
        fn cancel_guard(
            status in status(),
            match_riders in proptest::collection::vec((0i64..3, 0i64..3), 0..4),
        ) {
            let request = RideRequest {
                id: RideRequestId(1),
                rider_id: UserId(1),
                station_id: StationId(1),
                eta: "10:00".into(),
                destination: LatLng { lat: 0.0, lng: 0.0 },
                status,
            };
            let matches: Vec<Match> = match_riders
                .into_iter()
                .enumerate()
                .map(|(i, (rider, station))| Match {
                    id: MatchId(i as i64),
                    driver_id: DriverId(9),
                    rider_id: UserId(rider),
                    station_id: StationId(station),
                    formed_at: None,
                    status: MatchStatus::Active,
                })
                .collect();

            let rides = [request.clone()];
            let granted = request.cancellation(&rides, &matches).is_ok();
            prop_assert_eq!(
                granted,
                request.effective_status(&rides, &matches) == RideStatus::Looking
            );
            if granted {
                prop_assert_eq!(status, RideStatus::Looking);
            }
        }
    }
}
