//! Telemetry configuration loading from telemetry.toml
//!
//! This module provides the tuning knobs recognized by the aggregator: buffer
//! flush threshold, flush interval, context size cap, recent-occurrence cap,
//! retention TTL, and the enabled/disabled default. Any subset may be given in
//! the TOML file; omitted fields fall back to the defaults below.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for the error aggregator
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Buffer size at which a flush is triggered automatically
    pub flush_threshold: usize,
    /// Seconds between maintenance passes (flush + retention sweep)
    pub flush_interval_secs: u64,
    /// Running byte budget for a single record's sanitized context
    pub max_context_bytes: usize,
    /// Cap on the `recent_occurrences` list kept per aggregate
    pub max_recent_occurrences: usize,
    /// Days an aggregate may go unseen before the retention sweep deletes it
    pub retention_days: i64,
    /// Whether tracking is enabled at startup
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 100,
            flush_interval_secs: 60,
            max_context_bytes: 10_240,
            max_recent_occurrences: 1000,
            retention_days: 30,
            enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// The maintenance cadence as a [`Duration`]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// The retention TTL as a [`chrono::Duration`] for last-seen comparisons
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

/// Loads telemetry configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the telemetry.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TelemetryConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse telemetry.toml: {e}"),
    })
}

/// Loads telemetry configuration from the default location (./telemetry.toml)
pub fn load_default_config() -> Result<TelemetryConfig> {
    load_config("telemetry.toml")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_telemetry_config() {
        let toml_str = r"
            flush_threshold = 25
            flush_interval_secs = 10
            retention_days = 7
            enabled = false
        ";

        let config: TelemetryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.flush_threshold, 25);
        assert_eq!(config.flush_interval_secs, 10);
        assert_eq!(config.retention_days, 7);
        assert!(!config.enabled);

        // Omitted fields keep their defaults
        assert_eq!(config.max_context_bytes, 10_240);
        assert_eq!(config.max_recent_occurrences, 1000);
    }

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.flush_threshold, 100);
        assert_eq!(config.flush_interval(), Duration::from_secs(60));
        assert_eq!(config.retention(), chrono::Duration::days(30));
        assert!(config.enabled);
    }
}
