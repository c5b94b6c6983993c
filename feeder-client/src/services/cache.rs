//! Short-lived cache for the station list.
//!
//! Stations change only when an admin creates one, but every dashboard
//! loads the list on open and the rider view re-checks it before each
//! request. One cached list with a TTL keeps those reads off the wire.
//! A create through this client invalidates it immediately.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::Station;

type StationList = Arc<Vec<Station>>;

pub struct StationCache {
    // single-entry cache; moka handles expiry
    lists: MokaCache<(), StationList>,
}

impl StationCache {
    pub fn new(ttl: Duration) -> Self {
        let lists = MokaCache::builder()
            .time_to_live(ttl)
            .max_capacity(1)
            .build();
        Self { lists }
    }

    pub async fn get(&self) -> Option<StationList> {
        self.lists.get(&()).await
    }

    pub async fn insert(&self, stations: Vec<Station>) -> StationList {
        let entry = Arc::new(stations);
        self.lists.insert((), entry.clone()).await;
        entry
    }

    pub async fn invalidate(&self) {
        self.lists.invalidate(&()).await;
    }
}
