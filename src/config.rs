//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Default interval between background sweeps, in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 10_000;

/// Longest accepted sweep interval (one year).
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Environment variable holding the sweep interval in milliseconds.
pub const SWEEP_INTERVAL_ENV: &str = "TTL_CACHE_SWEEP_INTERVAL_MS";

/// Cache construction parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Interval between timer-driven sweeps of expired entries
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TTL_CACHE_SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: 10000)
    pub fn from_env() -> Self {
        let sweep_interval_ms = env::var(SWEEP_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS);

        Self {
            sweep_interval: Duration::from_millis(sweep_interval_ms),
        }
    }

    /// Returns a copy with the given sweep interval.
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_config_from_env() {
        // Both cases share one test so they never race on the variable
        env::remove_var(SWEEP_INTERVAL_ENV);
        assert_eq!(CacheConfig::from_env(), CacheConfig::default());

        env::set_var(SWEEP_INTERVAL_ENV, "250");
        assert_eq!(
            CacheConfig::from_env().sweep_interval,
            Duration::from_millis(250)
        );

        env::set_var(SWEEP_INTERVAL_ENV, "not-a-number");
        assert_eq!(CacheConfig::from_env(), CacheConfig::default());

        env::remove_var(SWEEP_INTERVAL_ENV);
    }

    #[test]
    fn test_with_sweep_interval() {
        let config = CacheConfig::default().with_sweep_interval(Duration::from_millis(5));
        assert_eq!(config.sweep_interval, Duration::from_millis(5));
    }
}
