//! Admin dashboard: the station list and the drivers currently simulating.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::info;

use crate::config::PollConfig;
use crate::domain::{Driver, NewStation, Role, Station};
use crate::error::FeederError;
use crate::services::Backend;
use crate::session::Session;
use crate::sync::{FetchGate, FetchSequence, PollScheduler, Reconciled, Trigger};

use super::{mark_closed, refresh_list};

/// What the admin dashboard shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminView {
    pub stations: Vec<Station>,
    /// Drivers with a running simulation. Parked drivers are not listed.
    pub drivers: Vec<Driver>,
}

#[derive(Debug, Default)]
struct AdminProjection {
    view: AdminView,
    stations_seq: FetchSequence,
    drivers_seq: FetchSequence,
}

impl AdminProjection {
    fn stations(&mut self) -> (&mut FetchSequence, &mut Vec<Station>) {
        (&mut self.stations_seq, &mut self.view.stations)
    }

    fn drivers(&mut self) -> (&mut FetchSequence, &mut Vec<Driver>) {
        (&mut self.drivers_seq, &mut self.view.drivers)
    }
}

struct AdminShared<B> {
    backend: Arc<B>,
    session: Session,
    state: RwLock<AdminProjection>,
    alive: AtomicBool,
    stations_gate: FetchGate,
    drivers_gate: FetchGate,
}

impl<B: Backend> AdminShared<B> {
    async fn refresh_drivers(&self, trigger: Trigger) -> Reconciled {
        refresh_list(
            "drivers",
            &self.drivers_gate,
            trigger,
            &self.state,
            &self.alive,
            AdminProjection::drivers,
            self.backend.active_drivers(),
        )
        .await
    }

    async fn refresh_stations(&self, bypass_cache: bool) -> Reconciled {
        if bypass_cache {
            refresh_list(
                "stations",
                &self.stations_gate,
                Trigger::Explicit,
                &self.state,
                &self.alive,
                AdminProjection::stations,
                self.backend.refresh_stations(),
            )
            .await
        } else {
            refresh_list(
                "stations",
                &self.stations_gate,
                Trigger::Explicit,
                &self.state,
                &self.alive,
                AdminProjection::stations,
                self.backend.list_stations(),
            )
            .await
        }
    }
}

/// The admin role's dashboard.
pub struct AdminDashboard<B: Backend> {
    shared: Arc<AdminShared<B>>,
    timers: Option<PollScheduler>,
}

impl<B: Backend> AdminDashboard<B> {
    /// Open the dashboard for an ADMIN session. Only the driver list is
    /// polled; stations change only through this dashboard.
    pub async fn open(
        backend: Arc<B>,
        session: Session,
        poll: PollConfig,
    ) -> Result<Self, FeederError> {
        session.require(Role::Admin)?;

        let shared = Arc::new(AdminShared {
            backend,
            session,
            state: RwLock::new(AdminProjection::default()),
            alive: AtomicBool::new(true),
            stations_gate: FetchGate::new(),
            drivers_gate: FetchGate::new(),
        });

        futures::join!(
            shared.refresh_stations(false),
            shared.refresh_drivers(Trigger::Explicit),
        );

        let mut timers = PollScheduler::new("admin");
        let s = Arc::clone(&shared);
        timers.every("drivers", poll.interval, move || {
            let s = Arc::clone(&s);
            async move {
                s.refresh_drivers(Trigger::Tick).await;
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

    pub async fn snapshot(&self) -> AdminView {
        self.shared.state.read().await.view.clone()
    }

    pub async fn refresh_drivers(&self) -> Reconciled {
        self.shared.refresh_drivers(Trigger::Explicit).await
    }

    pub async fn refresh_stations(&self) -> Reconciled {
        self.shared.refresh_stations(true).await
    }

    pub async fn poll_tick(&self) {
        self.shared.refresh_drivers(Trigger::Tick).await;
    }

    /// Add a station. The name must be non-empty and the coordinate valid;
    /// nothing is sent otherwise. On success the station list is re-read
    /// from the service.
    pub async fn create_station(
        &self,
        name: &str,
        lat: f64,
        lng: f64,
    ) -> Result<Station, FeederError> {
        let new = NewStation::new(name, lat, lng)?;
        let station = self.shared.backend.create_station(&new).await?;
        info!(station_id = %station.id, name = %station.name, "station created");

        self.shared.refresh_stations(true).await;
        Ok(station)
    }

    pub async fn close(mut self) {
        mark_closed(&self.shared.state, &self.shared.alive).await;
        if let Some(timers) = self.timers.take() {
            timers.shutdown().await;
        }
    }
}

impl<B: Backend> Drop for AdminDashboard<B> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
