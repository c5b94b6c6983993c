//! Role dashboards.
//!
//! One dashboard per role. Each owns a projection of the backend state it
//! shows, the timers that keep it fresh, and the intents its role may issue.
//! Projections are never shared between dashboards.
//!
//! A dashboard is opened against a [`Session`](crate::session::Session) and
//! is torn down with `close`, or by dropping it. After teardown no result
//! is applied, including ones from fetches already in flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use crate::services::ServiceError;
use crate::sync::{FetchGate, FetchSequence, Outcome, Reconciled, Step, Trigger, reconcile};

mod admin;
mod driver;
mod render;
mod rider;

pub use admin::{AdminDashboard, AdminView};
pub use driver::{DriverDashboard, DriverView};
pub use rider::{RiderDashboard, RiderView};

/// Refresh one list-valued resource.
///
/// Enters the resource's gate, takes a ticket, awaits `fetch` and folds the
/// result into the slot picked out by `slot`. A not-found empties the list.
/// `fetch` is inert until awaited, so nothing goes out unless the gate
/// admits the refresh.
pub(crate) async fn refresh_list<S, T>(
    resource: &'static str,
    gate: &FetchGate,
    trigger: Trigger,
    state: &RwLock<S>,
    alive: &AtomicBool,
    slot: impl Fn(&mut S) -> (&mut FetchSequence, &mut Vec<T>),
    fetch: impl Future<Output = Result<Vec<T>, ServiceError>>,
) -> Reconciled {
    let Some(_permit) = gate.enter(trigger).await else {
        debug!(resource, "previous fetch still in flight; skipping tick");
        return Reconciled::Skipped;
    };

    let ticket = {
        let mut guard = state.write().await;
        if !alive.load(Ordering::Acquire) {
            return Reconciled::Discarded;
        }
        slot(&mut *guard).0.begin()
    };

    let outcome = Outcome::from(fetch.await);

    let mut guard = state.write().await;
    if !alive.load(Ordering::Acquire) {
        debug!(resource, "dashboard closed; dropping result");
        return Reconciled::Discarded;
    }
    let (sequence, list) = slot(&mut *guard);
    match reconcile(resource, sequence, ticket, outcome) {
        Step::Replace(fresh) => {
            *list = fresh;
            Reconciled::Replaced
        }
        Step::Clear => {
            list.clear();
            Reconciled::Cleared
        }
        Step::Keep => Reconciled::Retained,
        Step::Discard => Reconciled::Discarded,
    }
}

/// Mark a dashboard closed and wait for any apply in progress to finish.
///
/// Every apply checks `alive` under the write lock, so once this returns
/// nothing more lands in the projection.
pub(crate) async fn mark_closed<S>(state: &RwLock<S>, alive: &AtomicBool) {
    alive.store(false, Ordering::Release);
    drop(state.write().await);
}
