//! Configuration Module
//!
//! Handles cache parameters: presets, builder setters and environment loading.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hard cap on concurrently live items
    pub capacity: usize,
    /// Lifetime given to items inserted without an override (zero = immortal)
    pub default_lifetime: Duration,
    /// Interval between auditor sweeps
    pub audit_interval: Duration,
    /// Pause the auditor takes after each sweep
    pub audit_delay: Duration,
    /// Size of the auditor's bounded error queue
    pub error_buffer: usize,
}

impl CacheConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short lifetimes and a fast auditor, for experiments and tests.
    pub fn debug() -> Self {
        Self {
            capacity: 10,
            default_lifetime: Duration::from_millis(500),
            audit_interval: Duration::from_millis(400),
            audit_delay: Duration::from_millis(10),
            error_buffer: 100,
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMCACHE_CAPACITY` - Maximum live items (default: 10)
    /// - `MEMCACHE_DEFAULT_LIFETIME_MS` - Default lifetime in ms (default: 5000)
    /// - `MEMCACHE_AUDIT_INTERVAL_MS` - Sweep interval in ms (default: 1000)
    /// - `MEMCACHE_AUDIT_DELAY_MS` - Post-sweep pause in ms (default: 10)
    /// - `MEMCACHE_ERROR_BUFFER` - Error queue size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_parse("MEMCACHE_CAPACITY").unwrap_or(defaults.capacity),
            default_lifetime: env_parse("MEMCACHE_DEFAULT_LIFETIME_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_lifetime),
            audit_interval: env_parse("MEMCACHE_AUDIT_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.audit_interval),
            audit_delay: env_parse("MEMCACHE_AUDIT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.audit_delay),
            error_buffer: env_parse("MEMCACHE_ERROR_BUFFER").unwrap_or(defaults.error_buffer),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    pub fn with_audit_interval(mut self, interval: Duration) -> Self {
        self.audit_interval = interval;
        self
    }

    pub fn with_audit_delay(mut self, delay: Duration) -> Self {
        self.audit_delay = delay;
        self
    }

    /// Sets the error queue size. Zero is raised to one since the queue
    /// must hold at least a single error.
    pub fn with_error_buffer(mut self, size: usize) -> Self {
        self.error_buffer = size.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            default_lifetime: Duration::from_secs(5),
            audit_interval: Duration::from_secs(1),
            audit_delay: Duration::from_millis(10),
            error_buffer: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
