//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::api::RateLimitConfig;
use crate::forward::{BreakerConfig, RetryConfig};

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Lifetime of a cached response in seconds
    pub cache_ttl_secs: u64,
    /// Per-attempt timeout for outbound calls in seconds
    pub forward_timeout_secs: u64,
    /// Total outbound attempts per request, including the first one
    pub retry_max_attempts: u32,
    /// Backoff before the first retry in milliseconds (doubles per retry)
    pub retry_base_delay_ms: u64,
    /// Failures within the window that open the circuit
    pub breaker_failure_threshold: u32,
    /// Sliding window for counting failures, in seconds
    pub breaker_window_secs: u64,
    /// How long an open circuit rejects calls before probing, in seconds
    pub breaker_cooldown_secs: u64,
    /// Requests allowed per client per window
    pub rate_limit_permits: u32,
    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Key rate limiting on `X-Forwarded-For` instead of the peer address
    pub trust_forwarded_for: bool,
    /// Expired-entry sweep interval in seconds, 0 disables the sweeper
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_TTL_SECS` - Cached response lifetime (default: 300)
    /// - `FORWARD_TIMEOUT_SECS` - Per-attempt outbound timeout (default: 10)
    /// - `RETRY_MAX_ATTEMPTS` - Outbound attempts including the first (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - First retry backoff (default: 200)
    /// - `BREAKER_FAILURE_THRESHOLD` - Failures that open the circuit (default: 5)
    /// - `BREAKER_WINDOW_SECS` - Failure counting window (default: 30)
    /// - `BREAKER_COOLDOWN_SECS` - Open circuit cool-down (default: 15)
    /// - `RATE_LIMIT_PERMITS` - Requests per client per window (default: 100)
    /// - `RATE_LIMIT_WINDOW_SECS` - Rate limit window (default: 60)
    /// - `TRUST_FORWARDED_FOR` - Identify clients by `X-Forwarded-For` (default: false)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            forward_timeout_secs: env_or("FORWARD_TIMEOUT_SECS", defaults.forward_timeout_secs),
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            breaker_failure_threshold: env_or(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_window_secs: env_or("BREAKER_WINDOW_SECS", defaults.breaker_window_secs),
            breaker_cooldown_secs: env_or("BREAKER_COOLDOWN_SECS", defaults.breaker_cooldown_secs),
            rate_limit_permits: env_or("RATE_LIMIT_PERMITS", defaults.rate_limit_permits),
            rate_limit_window_secs: env_or(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            trust_forwarded_for: env_or("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }

    /// Cache entry lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Retry policy for the outbound client.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry_max_attempts)
            .initial_delay(Duration::from_millis(self.retry_base_delay_ms))
            .attempt_timeout(Duration::from_secs(self.forward_timeout_secs))
    }

    /// Circuit breaker policy for the outbound client.
    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            window: Duration::from_secs(self.breaker_window_secs),
            cooldown: Duration::from_secs(self.breaker_cooldown_secs),
        }
    }

    /// Admission control policy for the proxy routes.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            permits: self.rate_limit_permits,
            window: Duration::from_secs(self.rate_limit_window_secs),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_ttl_secs: 300,
            forward_timeout_secs: 10,
            retry_max_attempts: 3,
            retry_base_delay_ms: 200,
            breaker_failure_threshold: 5,
            breaker_window_secs: 30,
            breaker_cooldown_secs: 15,
            rate_limit_permits: 100,
            rate_limit_window_secs: 60,
            trust_forwarded_for: false,
            cleanup_interval: 60,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
