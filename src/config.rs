//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.
//! The listening port comes from the command line, everything else from here.

use std::env;
use std::time::Duration;

use crate::cache::{MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
use crate::error::ConfigError;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total byte budget of the response cache
    pub max_cache_size: usize,
    /// Largest response that may be cached
    pub max_object_size: usize,
    /// Maximum number of concurrently served connections
    pub max_connections: usize,
    /// Deadline in seconds applied to each connect, read and write
    pub io_timeout: u64,
    /// Stats reporter interval in seconds, 0 disables the reporter
    pub stats_interval: u64,
    /// Port of the admin API, None disables it
    pub admin_port: Option<u16>,
    /// Send minimal HTTP error replies instead of silently closing
    pub error_responses: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_CACHE_SIZE` - Cache byte budget (default: 1049000)
    /// - `MAX_OBJECT_SIZE` - Per-response cache limit (default: 102400)
    /// - `MAX_CONNECTIONS` - Concurrent connection cap (default: 1024)
    /// - `IO_TIMEOUT` - I/O deadline in seconds (default: 30)
    /// - `STATS_INTERVAL` - Stats log frequency in seconds (default: 60)
    /// - `ADMIN_PORT` - Admin API port (default: disabled)
    /// - `ERROR_RESPONSES` - `true` or `1` to reply with HTTP errors (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_cache_size: parse_var("MAX_CACHE_SIZE").unwrap_or(defaults.max_cache_size),
            max_object_size: parse_var("MAX_OBJECT_SIZE").unwrap_or(defaults.max_object_size),
            max_connections: parse_var("MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            io_timeout: parse_var("IO_TIMEOUT").unwrap_or(defaults.io_timeout),
            stats_interval: parse_var("STATS_INTERVAL").unwrap_or(defaults.stats_interval),
            admin_port: parse_var("ADMIN_PORT"),
            error_responses: env::var("ERROR_RESPONSES")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.error_responses),
        }
    }

    // == Validate ==
    /// Rejects combinations the cache or listener cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_size == 0 {
            return Err(ConfigError::Zero("max_cache_size"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Zero("max_connections"));
        }
        if self.io_timeout == 0 {
            return Err(ConfigError::Zero("io_timeout"));
        }
        if self.max_object_size > self.max_cache_size {
            return Err(ConfigError::ObjectLargerThanCache {
                object: self.max_object_size,
                cache: self.max_cache_size,
            });
        }
        Ok(())
    }

    /// I/O deadline as a Duration.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cache_size: MAX_CACHE_SIZE,
            max_object_size: MAX_OBJECT_SIZE,
            max_connections: 1024,
            io_timeout: 30,
            stats_interval: 60,
            admin_port: None,
            error_responses: false,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
