//! Client configuration.
//!
//! Every backend service listens on its own port of a shared host. The
//! defaults match a local development deployment; `from_env` lets a
//! deployment override the host, poll cadence and timeouts.

use std::path::PathBuf;
use std::time::Duration;

/// Default host shared by all services.
const DEFAULT_API_BASE: &str = "http://localhost";

/// Default port per service.
const IDENTITY_PORT: u16 = 8001;
const STATION_PORT: u16 = 8002;
const RIDER_PORT: u16 = 8003;
const DRIVER_PORT: u16 = 8004;
const MATCHING_PORT: u16 = 8005;

/// Default seconds between dashboard refreshes.
const DEFAULT_POLL_SECS: u64 = 3;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default station list cache lifetime in seconds.
const DEFAULT_STATION_TTL_SECS: u64 = 60;

const DEFAULT_SESSION_FILE: &str = "feeder_session.json";

/// Base URL of each backend service, including the `/api` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub identity: String,
    pub station: String,
    pub rider: String,
    pub driver: String,
    pub matching: String,
}

impl ServiceEndpoints {
    /// Endpoints for the standard port layout on `base` (e.g. `http://localhost`).
    pub fn on_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let url = |port: u16| format!("{base}:{port}/api");
        Self {
            identity: url(IDENTITY_PORT),
            station: url(STATION_PORT),
            rider: url(RIDER_PORT),
            driver: url(DRIVER_PORT),
            matching: url(MATCHING_PORT),
        }
    }

    /// Point every service at the same base URL (for tests against a single
    /// fake server).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            identity: base.clone(),
            station: base.clone(),
            rider: base.clone(),
            driver: base.clone(),
            matching: base,
        }
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self::on_host(DEFAULT_API_BASE)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct FeederConfig {
    pub endpoints: ServiceEndpoints,
    /// Cadence of every dashboard refresh timer.
    pub poll_interval: Duration,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// How long a fetched station list is reused.
    pub station_ttl: Duration,
    /// Where the logged-in session is persisted between runs.
    pub session_file: PathBuf,
}

impl FeederConfig {
    /// Configuration with all defaults.
    pub fn new() -> Self {
        Self {
            endpoints: ServiceEndpoints::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            station_ttl: Duration::from_secs(DEFAULT_STATION_TTL_SECS),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }

    /// Read overrides from the environment.
    ///
    /// - `FEEDER_API_BASE`: host shared by all services
    /// - `FEEDER_POLL_SECS`: refresh cadence
    /// - `FEEDER_TIMEOUT_SECS`: request timeout
    /// - `FEEDER_SESSION_FILE`: session persistence path
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        if let Some(base) = lookup("FEEDER_API_BASE") {
            config.endpoints = ServiceEndpoints::on_host(&base);
        }
        if let Some(secs) = lookup("FEEDER_POLL_SECS").and_then(|s| s.parse::<u64>().ok())
            && secs > 0
        {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("FEEDER_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.timeout_secs = secs;
        }
        if let Some(path) = lookup("FEEDER_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }

        config
    }

    pub fn with_endpoints(mut self, endpoints: ServiceEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_station_ttl(mut self, ttl: Duration) -> Self {
        self.station_ttl = ttl;
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer settings handed to a dashboard when it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Cadence of each of the dashboard's refresh timers.
    pub interval: Duration,
}

impl PollConfig {
    pub fn every(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::every(Duration::from_secs(DEFAULT_POLL_SECS))
    }
}

impl From<&FeederConfig> for PollConfig {
    fn from(config: &FeederConfig) -> Self {
        Self::every(config.poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = FeederConfig::default();

        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.station_ttl, Duration::from_secs(60));
        assert_eq!(config.session_file, PathBuf::from("feeder_session.json"));
        assert_eq!(config.endpoints.identity, "http://localhost:8001/api");
        assert_eq!(config.endpoints.matching, "http://localhost:8005/api");
    }

    #[test]
    fn builder() {
        let config = FeederConfig::new()
            .with_poll_interval(Duration::from_millis(500))
            .with_timeout(5)
            .with_session_file("/tmp/s.json")
            .with_endpoints(ServiceEndpoints::single("http://127.0.0.1:9000/"));

        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.endpoints.driver, "http://127.0.0.1:9000");
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FEEDER_API_BASE", "http://10.0.0.5/"),
            ("FEEDER_POLL_SECS", "7"),
            ("FEEDER_TIMEOUT_SECS", "oops"),
        ]
        .into_iter()
        .collect();

        let config = FeederConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.endpoints.rider, "http://10.0.0.5:8003/api");
        assert_eq!(config.poll_interval, Duration::from_secs(7));
        // unparsable falls back
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn poll_config_follows_feeder_config() {
        let config = FeederConfig::new().with_poll_interval(Duration::from_secs(9));
        assert_eq!(PollConfig::from(&config).interval, Duration::from_secs(9));
        assert_eq!(PollConfig::default().interval, Duration::from_secs(3));
    }

    #[test]
    fn zero_poll_interval_ignored() {
        let config =
            FeederConfig::from_lookup(|k| (k == "FEEDER_POLL_SECS").then(|| "0".to_string()));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }
}
