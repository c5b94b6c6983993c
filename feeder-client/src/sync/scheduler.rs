//! Per-dashboard refresh timers.
//!
//! A [`PollScheduler`] owns every timer a dashboard runs. Timers are
//! started with [`PollScheduler::every`] and all stop together, either
//! through [`PollScheduler::shutdown`] or when the scheduler is dropped.
//! Nothing outlives the dashboard that created it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Owner of one dashboard's refresh timers.
pub struct PollScheduler {
    owner: &'static str,
    stop: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl PollScheduler {
    pub fn new(owner: &'static str) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            owner,
            stop,
            tasks: Vec::new(),
        }
    }

    /// Run `job` every `period`, starting one period from now.
    ///
    /// The first run is deliberately not immediate: dashboards do their own
    /// initial load. Ticks missed while a job runs long are delayed rather
    /// than bunched up. If the scheduler stops while `job` is running, the
    /// job is dropped at its next await point.
    pub fn every<F, Fut>(&mut self, resource: &'static str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut stop = self.stop.subscribe();
        let owner = self.owner;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = job() => {}
                }
            }
            debug!(owner, resource, "refresh timer stopped");
        });

        self.tasks.push((resource, handle));
    }

    /// Number of timers started.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every timer and wait for them to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        for (resource, handle) in std::mem::take(&mut self.tasks) {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                tracing::error!(owner = self.owner, resource, "refresh timer panicked");
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}
