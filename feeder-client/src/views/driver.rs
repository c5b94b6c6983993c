//! Driver dashboard.
//!
//! Shows the user's driver record and the matches formed for it. Two
//! timers run: one for the driver, one for its matches. Match polling only
//! goes out while a driver is known.
//!
//! The driver record disappears from the service once its route is done.
//! That not-found clears the driver and every match keyed by it under one
//! write lock, so the view never shows matches for a driver it no longer
//! has.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::domain::{
    Anomaly, Driver, DriverId, DriverState, DriverTransition, LatLng, Match, NewDriver,
    NotPermitted, Observation, Role, Station, remove_keyed_by, station_name,
};
use crate::error::FeederError;
use crate::services::{Backend, ServiceError};
use crate::session::Session;
use crate::sync::{
    FetchGate, FetchSequence, Outcome, PollScheduler, Reconciled, Step, Trigger, reconcile,
};

use super::{mark_closed, refresh_list};

/// What the driver dashboard shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverView {
    pub driver: DriverState,
    pub matches: Vec<Match>,
    pub stations: Vec<Station>,
}

impl DriverView {
    pub fn station_name(&self, id: crate::domain::StationId) -> String {
        station_name(&self.stations, id)
    }
}

#[derive(Debug, Default)]
struct DriverProjection {
    view: DriverView,
    driver_seq: FetchSequence,
    matches_seq: FetchSequence,
    stations_seq: FetchSequence,
    /// Created by this dashboard but not yet seen by a read. The driver
    /// service may answer not-found once before the write is visible.
    unconfirmed: Option<DriverId>,
}

impl DriverProjection {
    fn stations(&mut self) -> (&mut FetchSequence, &mut Vec<Station>) {
        (&mut self.stations_seq, &mut self.view.stations)
    }
}

struct DriverShared<B> {
    backend: Arc<B>,
    session: Session,
    state: RwLock<DriverProjection>,
    alive: AtomicBool,
    driver_gate: FetchGate,
    matches_gate: FetchGate,
    stations_gate: FetchGate,
}

fn log_observation(obs: &Observation, driver: &Driver) {
    let id = driver.id;
    match obs.transition {
        DriverTransition::Registered => info!(driver_id = %id, "driver registered"),
        DriverTransition::Started => info!(driver_id = %id, "simulation started"),
        DriverTransition::Stopped => info!(
            driver_id = %id,
            remaining = driver.route_queue.len(),
            "simulation stopped"
        ),
        DriverTransition::RouteCompleted => {
            info!(driver_id = %id, "route complete; driver will be removed")
        }
        DriverTransition::Progressed => debug!(
            driver_id = %id,
            remaining = driver.route_queue.len(),
            position = %driver.position,
            "driver moved"
        ),
        DriverTransition::Unchanged => {}
    }

    for anomaly in &obs.anomalies {
        match anomaly {
            // the matcher pushes a pickup station onto the front of the queue
            Anomaly::QueueGrew { from, to } => {
                debug!(driver_id = %id, from, to, "route queue grew while simulating")
            }
            Anomaly::ClockRegressed { from, to } => {
                warn!(driver_id = %id, %from, %to, "simulation clock went backwards")
            }
        }
    }
}

impl<B: Backend> DriverShared<B> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn refresh_driver(&self, trigger: Trigger) -> Reconciled {
        let Some(_permit) = self.driver_gate.enter(trigger).await else {
            debug!(resource = "driver", "previous fetch still in flight; skipping tick");
            return Reconciled::Skipped;
        };

        let ticket = {
            let mut st = self.state.write().await;
            if !self.is_alive() {
                return Reconciled::Discarded;
            }
            st.driver_seq.begin()
        };

        let outcome = Outcome::from(self.backend.driver_for_user(self.session.user_id).await);

        let mut st = self.state.write().await;
        if !self.is_alive() {
            debug!(resource = "driver", "dashboard closed; dropping result");
            return Reconciled::Discarded;
        }
        let st = &mut *st;
        match reconcile("driver", &mut st.driver_seq, ticket, outcome) {
            Step::Replace(driver) => {
                st.unconfirmed = None;
                if let Some(old) = st.view.driver.driver_id()
                    && old != driver.id
                {
                    let cleared = remove_keyed_by(&mut st.view.matches, old);
                    st.matches_seq.supersede();
                    info!(
                        driver_id = %old,
                        replaced_by = %driver.id,
                        matches_cleared = cleared,
                        "driver replaced; old matches cleared"
                    );
                }
                let obs = st.view.driver.observe(driver.clone());
                log_observation(&obs, &driver);
                Reconciled::Replaced
            }
            Step::Clear => {
                let created = st.unconfirmed.take();
                if created.is_some() && created == st.view.driver.driver_id() {
                    debug!(resource = "driver", "new driver not visible yet; keeping it");
                    return Reconciled::Retained;
                }
                let expected = st.view.driver.is_eligible_for_removal();
                if let Some(id) = st.view.driver.mark_removed() {
                    let cleared = remove_keyed_by(&mut st.view.matches, id);
                    // results for the old driver must not come back
                    st.matches_seq.supersede();
                    if expected {
                        info!(
                            driver_id = %id,
                            matches_cleared = cleared,
                            "route complete; driver removed"
                        );
                    } else {
                        info!(
                            driver_id = %id,
                            matches_cleared = cleared,
                            "driver no longer exists; view cleared"
                        );
                    }
                }
                Reconciled::Cleared
            }
            Step::Keep => Reconciled::Retained,
            Step::Discard => Reconciled::Discarded,
        }
    }

    async fn refresh_matches(&self, trigger: Trigger) -> Reconciled {
        let Some(driver_id) = self.state.read().await.view.driver.driver_id() else {
            debug!(resource = "matches", "no driver; match poll gated off");
            return Reconciled::Skipped;
        };
        let Some(_permit) = self.matches_gate.enter(trigger).await else {
            debug!(resource = "matches", "previous fetch still in flight; skipping tick");
            return Reconciled::Skipped;
        };

        let ticket = {
            let mut st = self.state.write().await;
            if !self.is_alive() {
                return Reconciled::Discarded;
            }
            st.matches_seq.begin()
        };

        let outcome = Outcome::from(self.backend.matches_for_driver(driver_id).await);

        let mut st = self.state.write().await;
        if !self.is_alive() {
            debug!(resource = "matches", "dashboard closed; dropping result");
            return Reconciled::Discarded;
        }
        if st.view.driver.driver_id() != Some(driver_id) {
            debug!(resource = "matches", %driver_id, "driver changed while fetching; dropping");
            return Reconciled::Discarded;
        }
        let st = &mut *st;
        match reconcile("matches", &mut st.matches_seq, ticket, outcome) {
            Step::Replace(matches) => {
                st.view.matches = matches;
                Reconciled::Replaced
            }
            Step::Clear => {
                st.view.matches.clear();
                Reconciled::Cleared
            }
            Step::Keep => Reconciled::Retained,
            Step::Discard => Reconciled::Discarded,
        }
    }

    async fn refresh_stations(&self, trigger: Trigger) -> Reconciled {
        refresh_list(
            "stations",
            &self.stations_gate,
            trigger,
            &self.state,
            &self.alive,
            DriverProjection::stations,
            self.backend.list_stations(),
        )
        .await
    }

    async fn poll(&self, trigger: Trigger) {
        self.refresh_driver(trigger).await;
        self.refresh_matches(trigger).await;
    }
}

/// The driver role's dashboard.
pub struct DriverDashboard<B: Backend> {
    shared: Arc<DriverShared<B>>,
    timers: Option<PollScheduler>,
}

impl<B: Backend> DriverDashboard<B> {
    /// Open the dashboard for a DRIVER session: load everything once, then
    /// start the timers.
    pub async fn open(
        backend: Arc<B>,
        session: Session,
        poll: PollConfig,
    ) -> Result<Self, FeederError> {
        session.require(Role::Driver)?;

        let shared = Arc::new(DriverShared {
            backend,
            session,
            state: RwLock::new(DriverProjection::default()),
            alive: AtomicBool::new(true),
            driver_gate: FetchGate::new(),
            matches_gate: FetchGate::new(),
            stations_gate: FetchGate::new(),
        });

        futures::join!(
            shared.refresh_stations(Trigger::Explicit),
            shared.refresh_driver(Trigger::Explicit),
        );
        shared.refresh_matches(Trigger::Explicit).await;

        let mut timers = PollScheduler::new("driver");
        let s = Arc::clone(&shared);
        timers.every("driver", poll.interval, move || {
            let s = Arc::clone(&s);
            async move {
                s.refresh_driver(Trigger::Tick).await;
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

    /// A copy of what the dashboard currently shows.
    pub async fn snapshot(&self) -> DriverView {
        self.shared.state.read().await.view.clone()
    }

    pub async fn refresh_driver(&self) -> Reconciled {
        self.shared.refresh_driver(Trigger::Explicit).await
    }

    pub async fn refresh_matches(&self) -> Reconciled {
        self.shared.refresh_matches(Trigger::Explicit).await
    }

    /// What one timer tick does: driver first, then its matches. Skips any
    /// resource whose previous fetch is still out.
    pub async fn poll_tick(&self) {
        self.shared.poll(Trigger::Tick).await;
    }

    /// Register a driver for this user with the given seats and route.
    ///
    /// Input is checked before anything is sent. The create is never
    /// retried; on success the driver is shown at once and re-read.
    pub async fn register(
        &self,
        free_seats: i64,
        waypoints: Vec<LatLng>,
    ) -> Result<Driver, FeederError> {
        if let Some(id) = self.shared.state.read().await.view.driver.driver_id() {
            return Err(NotPermitted::DriverExists(id).into());
        }
        let new = NewDriver::new(self.shared.session.user_id, free_seats, waypoints)?;

        let driver = self.shared.backend.create_driver(&new).await?;
        info!(driver_id = %driver.id, waypoints = driver.route_queue.len(), "driver created");

        {
            let mut st = self.shared.state.write().await;
            if self.shared.is_alive() {
                st.driver_seq.apply_now();
                st.unconfirmed = Some(driver.id);
                st.view.driver.observe(driver.clone());
            }
        }

        self.shared.poll(Trigger::Explicit).await;
        Ok(driver)
    }

    pub async fn start(&self) -> Result<(), FeederError> {
        let id = self.known_driver().await?;
        let result = self.shared.backend.start_simulation(id).await;
        self.follow_up(id, "start", result).await
    }

    /// Stop the simulation. Allowed at any queue depth.
    pub async fn stop(&self) -> Result<(), FeederError> {
        let id = self.known_driver().await?;
        let result = self.shared.backend.stop_simulation(id).await;
        self.follow_up(id, "stop", result).await
    }

    async fn known_driver(&self) -> Result<DriverId, NotPermitted> {
        self.shared
            .state
            .read()
            .await
            .view
            .driver
            .driver_id()
            .ok_or(NotPermitted::NoDriver)
    }

    /// Re-read after a start or stop. A not-found means the driver is gone,
    /// which the re-read turns into a cleared view rather than an error.
    async fn follow_up(
        &self,
        id: DriverId,
        action: &'static str,
        result: Result<(), ServiceError>,
    ) -> Result<(), FeederError> {
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!(driver_id = %id, action, "driver vanished before the call landed");
            }
            Err(e) => return Err(e.into()),
        }
        self.shared.poll(Trigger::Explicit).await;
        Ok(())
    }

    /// Stop the timers. Nothing is applied after this returns.
    pub async fn close(mut self) {
        mark_closed(&self.shared.state, &self.shared.alive).await;
        if let Some(timers) = self.timers.take() {
            timers.shutdown().await;
        }
    }
}

impl<B: Backend> Drop for DriverDashboard<B> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
