//! Keeping dashboard projections in step with the backend.
//!
//! The backend pushes nothing, so every dashboard polls. This module holds
//! the three moving parts the dashboards share:
//!
//! - [`PollScheduler`]: the timers, owned by one dashboard and stopped with it
//! - [`FetchGate`]: one outstanding fetch per resource
//! - [`reconcile`]: folds a fetch result into the cached projection

mod gate;
mod reconcile;
mod scheduler;

pub use gate::{FetchGate, FetchPermit, Trigger};
pub use reconcile::{FetchSequence, Outcome, Reconciled, Step, Ticket, reconcile};
pub use scheduler::PollScheduler;
