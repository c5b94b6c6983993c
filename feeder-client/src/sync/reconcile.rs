//! Snapshot-replace reconciliation.
//!
//! Every poll result is folded into a dashboard's projection through
//! [`reconcile`], which decides one of four things:
//!
//! - a fresh snapshot replaces the cached value wholesale,
//! - a not-found clears the entity (the caller clears everything derived
//!   from it in the same critical section),
//! - any other failure keeps the last good value and is logged,
//! - a result that lost the race to a newer one is dropped.
//!
//! Ordering is tracked per resource with a [`FetchSequence`]. Each fetch
//! takes a [`Ticket`] before it goes out; a result is only admitted if no
//! later ticket has been applied yet. Last-completed wins, and a superseded
//! completion never overwrites newer data.

use tracing::{debug, warn};

use crate::services::{ErrorClass, ServiceError};

/// Position of a fetch in its resource's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Per-resource fetch ordering.
#[derive(Debug, Clone, Default)]
pub struct FetchSequence {
    started: u64,
    applied: u64,
}

impl FetchSequence {
    /// Take a ticket for a fetch that is about to be issued.
    pub fn begin(&mut self) -> Ticket {
        self.started += 1;
        Ticket(self.started)
    }

    /// Record that the result for `ticket` is being applied.
    ///
    /// Returns `false` if a result at least as new has already been
    /// applied, in which case the caller must drop this one.
    pub fn admit(&mut self, ticket: Ticket) -> bool {
        if ticket.0 <= self.applied {
            return false;
        }
        self.applied = ticket.0;
        true
    }

    /// Invalidate every fetch currently in flight.
    ///
    /// Used when the resource's parent entity is cleared: results for the
    /// old parent must not repopulate the view.
    pub fn supersede(&mut self) {
        self.applied = self.started;
    }

    /// Take a ticket and admit it at once, for results that arrive from a
    /// write call rather than a poll.
    pub fn apply_now(&mut self) -> Ticket {
        let ticket = self.begin();
        self.applied = ticket.0;
        ticket
    }
}

/// A fetch result, classified for reconciliation.
#[derive(Debug)]
pub enum Outcome<T> {
    Fresh(T),
    Gone,
    Failed(ServiceError),
}

impl<T> From<Result<T, ServiceError>> for Outcome<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(value) => Outcome::Fresh(value),
            Err(e) if e.class() == ErrorClass::NotFound => Outcome::Gone,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// What the caller should do with an outcome.
#[derive(Debug, PartialEq)]
pub enum Step<T> {
    Replace(T),
    Clear,
    Keep,
    Discard,
}

/// What happened to one refresh, as reported to callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Replaced,
    Cleared,
    /// Failure, or a not-found the lifecycle says to tolerate. The previous
    /// projection is untouched.
    Retained,
    /// Superseded, or arrived after teardown.
    Discarded,
    /// No fetch was issued: gated off, or one is already in flight.
    Skipped,
}

/// Decide how `outcome` for `ticket` should be applied to `resource`.
pub fn reconcile<T>(
    resource: &'static str,
    sequence: &mut FetchSequence,
    ticket: Ticket,
    outcome: Outcome<T>,
) -> Step<T> {
    match outcome {
        // a failure carries no information, so it neither supersedes nor
        // is superseded
        Outcome::Failed(err) => {
            warn!(
                resource,
                error = %err,
                class = ?err.class(),
                "refresh failed; keeping last snapshot"
            );
            Step::Keep
        }
        _ if !sequence.admit(ticket) => {
            debug!(resource, ?ticket, "dropping superseded result");
            Step::Discard
        }
        Outcome::Fresh(value) => Step::Replace(value),
        Outcome::Gone => Step::Clear,
    }
}
