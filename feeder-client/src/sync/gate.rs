//! At most one fetch per resource at a time.

use tokio::sync::{Mutex, MutexGuard};

/// Why a refresh is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A timer fired. Skipped if a fetch for the resource is already out.
    Tick,
    /// Open, or follow-up to a user intent. Waits its turn instead.
    Explicit,
}

/// Serializes fetches of one resource.
#[derive(Debug, Default)]
pub struct FetchGate {
    lock: Mutex<()>,
}

pub type FetchPermit<'a> = MutexGuard<'a, ()>;

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permission to fetch, or `None` if a timer tick should be skipped.
    pub async fn enter(&self, trigger: Trigger) -> Option<FetchPermit<'_>> {
        match trigger {
            Trigger::Tick => self.lock.try_lock().ok(),
            Trigger::Explicit => Some(self.lock.lock().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tick_skips_while_held() {
        let gate = FetchGate::new();
        let held = gate.enter(Trigger::Explicit).await;
        assert!(held.is_some());
        assert!(gate.enter(Trigger::Tick).await.is_none());

        drop(held);
        assert!(gate.enter(Trigger::Tick).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_waits_its_turn() {
        use std::time::Duration;

        let gate = std::sync::Arc::new(FetchGate::new());
        let held = gate.enter(Trigger::Explicit).await;

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.enter(Trigger::Explicit).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }
}
