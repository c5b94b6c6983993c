//! Rider dashboard.
//!
//! Lists the rider's ride requests and the matches formed for them. The
//! rider and matching services are polled on separate timers, so the two
//! lists can disagree for a tick or two; [`RiderView::status_of`] folds the
//! matches in so a request shows MATCHED as soon as either service knows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::domain::{
    DomainError, Match, NewRideRequest, NotPermitted, RideRequest, RideRequestId, RideStatus,
    Role, Station, StationId, station_name,
};
use crate::error::FeederError;
use crate::services::Backend;
use crate::session::Session;
use crate::sync::{FetchGate, FetchSequence, PollScheduler, Reconciled, Trigger};

use super::{mark_closed, refresh_list};

/// What the rider dashboard shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiderView {
    pub rides: Vec<RideRequest>,
    pub matches: Vec<Match>,
    pub stations: Vec<Station>,
}

impl RiderView {
    /// The status to display for `ride`.
    pub fn status_of(&self, ride: &RideRequest) -> RideStatus {
        ride.effective_status(&self.rides, &self.matches)
    }

    pub fn ride(&self, id: RideRequestId) -> Option<&RideRequest> {
        self.rides.iter().find(|r| r.id == id)
    }

    pub fn has_station(&self, id: StationId) -> bool {
        self.stations.iter().any(|s| s.id == id)
    }

    pub fn station_name(&self, id: StationId) -> String {
        station_name(&self.stations, id)
    }
}

#[derive(Debug, Default)]
struct RiderProjection {
    view: RiderView,
    rides_seq: FetchSequence,
    matches_seq: FetchSequence,
    stations_seq: FetchSequence,
}

impl RiderProjection {
    fn rides(&mut self) -> (&mut FetchSequence, &mut Vec<RideRequest>) {
        (&mut self.rides_seq, &mut self.view.rides)
    }

    fn matches(&mut self) -> (&mut FetchSequence, &mut Vec<Match>) {
        (&mut self.matches_seq, &mut self.view.matches)
    }

    fn stations(&mut self) -> (&mut FetchSequence, &mut Vec<Station>) {
        (&mut self.stations_seq, &mut self.view.stations)
    }
}

struct RiderShared<B> {
    backend: Arc<B>,
    session: Session,
    state: RwLock<RiderProjection>,
    alive: AtomicBool,
    rides_gate: FetchGate,
    matches_gate: FetchGate,
    stations_gate: FetchGate,
}

impl<B: Backend> RiderShared<B> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn refresh_rides(&self, trigger: Trigger) -> Reconciled {
        refresh_list(
            "rides",
            &self.rides_gate,
            trigger,
            &self.state,
            &self.alive,
            RiderProjection::rides,
            self.backend.rides_for_rider(self.session.user_id),
        )
        .await
    }

    async fn refresh_matches(&self, trigger: Trigger) -> Reconciled {
        refresh_list(
            "matches",
            &self.matches_gate,
            trigger,
            &self.state,
            &self.alive,
            RiderProjection::matches,
            self.backend.matches_for_rider(self.session.user_id),
        )
        .await
    }

    async fn refresh_stations(&self, trigger: Trigger) -> Reconciled {
        refresh_list(
            "stations",
            &self.stations_gate,
            trigger,
            &self.state,
            &self.alive,
            RiderProjection::stations,
            self.backend.list_stations(),
        )
        .await
    }

    /// Station list straight from the service, skipping any cache.
    async fn reload_stations(&self) -> Reconciled {
        refresh_list(
            "stations",
            &self.stations_gate,
            Trigger::Explicit,
            &self.state,
            &self.alive,
            RiderProjection::stations,
            self.backend.refresh_stations(),
        )
        .await
    }
}

/// The rider role's dashboard.
pub struct RiderDashboard<B: Backend> {
    shared: Arc<RiderShared<B>>,
    timers: Option<PollScheduler>,
}

impl<B: Backend> RiderDashboard<B> {
    /// Open the dashboard for a RIDER session.
    pub async fn open(
        backend: Arc<B>,
        session: Session,
        poll: PollConfig,
    ) -> Result<Self, FeederError> {
        session.require(Role::Rider)?;

        let shared = Arc::new(RiderShared {
            backend,
            session,
            state: RwLock::new(RiderProjection::default()),
            alive: AtomicBool::new(true),
            rides_gate: FetchGate::new(),
            matches_gate: FetchGate::new(),
            stations_gate: FetchGate::new(),
        });

        futures::join!(
            shared.refresh_stations(Trigger::Explicit),
            shared.refresh_rides(Trigger::Explicit),
            shared.refresh_matches(Trigger::Explicit),
        );

        let mut timers = PollScheduler::new("rider");
        let s = Arc::clone(&shared);
        timers.every("rides", poll.interval, move || {
            let s = Arc::clone(&s);
            async move {
                s.refresh_rides(Trigger::Tick).await;
            }
        });
        let s = Arc::clone(&shared);
        timers.every("matches", poll.interval, move || {
            let s = Arc::clone(&s);
            async move {
                s.refresh_matches(Trigger::Tick).await;
            }
        });

        Ok(Self {
            shared,
            timers: Some(timers),
        })
    }

    pub fn session(&self) -> &Session {
        &self.shared.session
    }

    pub async fn snapshot(&self) -> RiderView {
        self.shared.state.read().await.view.clone()
    }

    pub async fn refresh_rides(&self) -> Reconciled {
        self.shared.refresh_rides(Trigger::Explicit).await
    }

    pub async fn refresh_matches(&self) -> Reconciled {
        self.shared.refresh_matches(Trigger::Explicit).await
    }

    pub async fn refresh_stations(&self) -> Reconciled {
        self.shared.refresh_stations(Trigger::Explicit).await
    }

    /// What one round of timer ticks does.
    pub async fn poll_tick(&self) {
        self.shared.refresh_rides(Trigger::Tick).await;
        self.shared.refresh_matches(Trigger::Tick).await;
    }

    /// Ask for a pickup at `station`.
    ///
    /// The ETA and destination are checked first, then the station against
    /// the station list; a station not in the list triggers one re-fetch
    /// before the request is refused. The create is never retried.
    pub async fn request_ride(
        &self,
        station: StationId,
        eta: &str,
        destination: (f64, f64),
    ) -> Result<RideRequest, FeederError> {
        let new = NewRideRequest::new(self.shared.session.user_id, station, eta, destination)?;

        let known = self.shared.state.read().await.view.has_station(station);
        if !known {
            debug!(station_id = %station, "station not in cached list; re-fetching");
            self.shared.reload_stations().await;
            if !self.shared.state.read().await.view.has_station(station) {
                return Err(DomainError::UnknownStation(station).into());
            }
        }

        let ride = self.shared.backend.create_ride(&new).await?;
        info!(ride_id = %ride.id, station_id = %station, eta = %ride.eta, "ride requested");

        {
            let mut st = self.shared.state.write().await;
            if self.shared.is_alive() {
                st.rides_seq.apply_now();
                st.view.rides.retain(|r| r.id != ride.id);
                st.view.rides.push(ride.clone());
            }
        }

        self.shared.refresh_rides(Trigger::Explicit).await;
        Ok(ride)
    }

    /// Withdraw a LOOKING request.
    ///
    /// Refused without a network call if the request is not in the view or
    /// the view says it has left LOOKING, including by a match the rider
    /// service has not caught up with.
    pub async fn cancel_ride(&self, id: RideRequestId) -> Result<(), FeederError> {
        let cancellation = {
            let st = self.shared.state.read().await;
            let ride = st
                .view
                .ride(id)
                .ok_or(NotPermitted::UnknownRideRequest(id))?;
            ride.cancellation(&st.view.rides, &st.view.matches)?
        };

        match self.shared.backend.cancel_ride(cancellation).await {
            Ok(()) => info!(ride_id = %id, "ride cancelled"),
            Err(e) if e.is_not_found() => {
                info!(ride_id = %id, "ride already gone from the rider service");
            }
            Err(e) => return Err(e.into()),
        }

        {
            let mut st = self.shared.state.write().await;
            if self.shared.is_alive() {
                st.rides_seq.apply_now();
                if let Some(ride) = st.view.rides.iter_mut().find(|r| r.id == id) {
                    ride.status = RideStatus::Cancelled;
                }
            }
        }

        self.shared.refresh_rides(Trigger::Explicit).await;
        Ok(())
    }

    pub async fn close(mut self) {
        mark_closed(&self.shared.state, &self.shared.alive).await;
        if let Some(timers) = self.timers.take() {
            timers.shutdown().await;
        }
    }
}

impl<B: Backend> Drop for RiderDashboard<B> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "rider_tests.rs"]
mod tests;
