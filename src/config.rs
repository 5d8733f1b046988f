//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default per-request deadline (60 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the background sweeper looks for overdue requests.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Immutable chunks kept in the client cache.
const DEFAULT_IMMUTABLE_CACHE_CAPACITY: usize = 1000;

/// Runtime settings for a [`Client`](crate::Client).
///
/// Missing fields fall back to their defaults when deserializing.
///
/// ```
/// use std::time::Duration;
/// use iroh_safe_client::ClientConfig;
///
/// let config = ClientConfig::from_json_str(
///     r#"{ "request_timeout": { "secs": 5, "nanos": 0 } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.request_timeout, Duration::from_secs(5));
/// assert_eq!(config.immutable_cache_capacity, 1000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline applied to every request at submission time.
    pub request_timeout: Duration,
    /// Period of the overdue-request sweep.
    pub sweep_interval: Duration,
    /// Capacity of the immutable data cache. `0` disables caching.
    pub immutable_cache_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            immutable_cache_capacity: DEFAULT_IMMUTABLE_CACHE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the sweep period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the immutable cache capacity.
    pub fn with_immutable_cache_capacity(mut self, capacity: usize) -> Self {
        self.immutable_cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = ClientConfig::from_json_str("{}").expect("valid config");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ClientConfig::default()
            .with_request_timeout(Duration::from_millis(250))
            .with_sweep_interval(Duration::from_millis(5))
            .with_immutable_cache_capacity(0);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.sweep_interval, Duration::from_millis(5));
        assert_eq!(config.immutable_cache_capacity, 0);
    }
}
