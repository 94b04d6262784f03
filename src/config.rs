//! Governance Configuration
//!
//! Tunables for rate limiting, session caps, and challenge selection.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default login rate limit (attempts per window)
pub const DEFAULT_RATE_LIMIT: u32 = 10;
/// Default rate-limit window in milliseconds
pub const DEFAULT_WINDOW_MS: i64 = 60_000;
/// Default block duration after exceeding the limit, in milliseconds
pub const DEFAULT_BLOCK_MS: i64 = 300_000;
/// Default maximum concurrently active sessions per identity
pub const DEFAULT_SESSION_MAX: usize = 2;
/// Default minimum interval between liveness refreshes, in seconds
pub const DEFAULT_TOUCH_INTERVAL_SECS: i64 = 60;
/// Default session retention horizon in days
pub const DEFAULT_SESSION_RETENTION_DAYS: i64 = 30;
/// Default cap on how often a question may be re-served as a challenge
pub const DEFAULT_SERVE_CAP: u32 = 5;
/// Default retention of daily usage counters in the store, in days
pub const DEFAULT_USAGE_RETENTION_DAYS: u64 = 2;

/// Governance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Requests allowed per rate-limit window
    pub rate_limit: u32,

    /// Rate-limit window duration (milliseconds)
    pub rate_window_ms: i64,

    /// Block duration once the window limit is exceeded (milliseconds)
    pub rate_block_ms: i64,

    /// Maximum concurrently active sessions per identity
    pub session_max: usize,

    /// Minimum interval between `last_seen_at` refreshes (seconds)
    pub touch_interval_secs: i64,

    /// Sessions older than this horizon are purged lazily on read (days)
    pub session_retention_days: i64,

    /// Maximum times one question is surfaced as a challenge per client
    pub serve_cap: u32,

    /// Store TTL for daily usage counters (days)
    pub usage_retention_days: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window_ms: DEFAULT_WINDOW_MS,
            rate_block_ms: DEFAULT_BLOCK_MS,
            session_max: DEFAULT_SESSION_MAX,
            touch_interval_secs: DEFAULT_TOUCH_INTERVAL_SECS,
            session_retention_days: DEFAULT_SESSION_RETENTION_DAYS,
            serve_cap: DEFAULT_SERVE_CAP,
            usage_retention_days: DEFAULT_USAGE_RETENTION_DAYS,
        }
    }
}

impl GovernanceConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EXAMGATE_RATE_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.rate_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_RATE_WINDOW_MS") {
            if let Ok(ms) = val.parse() {
                config.rate_window_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_RATE_BLOCK_MS") {
            if let Ok(ms) = val.parse() {
                config.rate_block_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_SESSION_MAX") {
            if let Ok(max) = val.parse() {
                config.session_max = max;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_TOUCH_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                config.touch_interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_SESSION_RETENTION_DAYS") {
            if let Ok(days) = val.parse() {
                config.session_retention_days = days;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_SERVE_CAP") {
            if let Ok(cap) = val.parse() {
                config.serve_cap = cap;
            }
        }

        if let Ok(val) = std::env::var("EXAMGATE_USAGE_RETENTION_DAYS") {
            if let Ok(days) = val.parse() {
                config.usage_retention_days = days;
            }
        }

        config
    }

    /// Usage counter retention as a store TTL
    pub fn usage_retention(&self) -> Duration {
        Duration::from_secs(self.usage_retention_days * 24 * 3600)
    }

    /// Rate-limit window as a store TTL (window plus block, so a bucket
    /// outlives any block it may carry)
    pub fn bucket_retention(&self) -> Duration {
        Duration::from_millis((self.rate_window_ms + self.rate_block_ms).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernanceConfig::default();
        assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
        assert_eq!(config.session_max, DEFAULT_SESSION_MAX);
        assert_eq!(config.serve_cap, DEFAULT_SERVE_CAP);
    }

    // Single test for all EXAMGATE_* variables so parallel test runs never
    // race on the process environment
    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("EXAMGATE_RATE_LIMIT", "77");
        std::env::set_var("EXAMGATE_SESSION_MAX", "5");
        std::env::set_var("EXAMGATE_SESSION_RETENTION_DAYS", "7");
        std::env::set_var("EXAMGATE_USAGE_RETENTION_DAYS", "4");
        std::env::set_var("EXAMGATE_SERVE_CAP", "not-a-number");

        let config = GovernanceConfig::from_env();
        assert_eq!(config.rate_limit, 77);
        assert_eq!(config.session_max, 5);
        assert_eq!(config.session_retention_days, 7);
        assert_eq!(config.usage_retention_days, 4);
        // Unparsable values keep the default
        assert_eq!(config.serve_cap, DEFAULT_SERVE_CAP);
        // Unset variables keep the default
        assert_eq!(config.rate_window_ms, DEFAULT_WINDOW_MS);

        std::env::remove_var("EXAMGATE_RATE_LIMIT");
        std::env::remove_var("EXAMGATE_SESSION_MAX");
        std::env::remove_var("EXAMGATE_SESSION_RETENTION_DAYS");
        std::env::remove_var("EXAMGATE_USAGE_RETENTION_DAYS");
        std::env::remove_var("EXAMGATE_SERVE_CAP");
    }

    #[test]
    fn test_usage_retention() {
        let config = GovernanceConfig::default();
        assert_eq!(config.usage_retention(), Duration::from_secs(2 * 24 * 3600));
    }

    #[test]
    fn test_bucket_retention_covers_block() {
        let config = GovernanceConfig::default();
        assert_eq!(config.bucket_retention(), Duration::from_millis(360_000));
    }

    #[test]
    fn test_config_serialization() {
        let config = GovernanceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GovernanceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.rate_limit, parsed.rate_limit);
        assert_eq!(config.session_max, parsed.session_max);
    }
}
