//! Configuration management for Charge APT
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{ChargeError, Result};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "CHARGEAPT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Where samples and live snapshots are read from
    pub sources: SourcesConfig,

    /// Live status polling configuration
    pub status: StatusConfig,

    /// Report rendering configuration
    pub report: ReportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level (falls back to `level`)
    pub console_level: Option<String>,

    /// Optional file-specific level (falls back to `level`)
    pub file_level: Option<String>,

    /// Directory or file path for the rolling log
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// External input locations
///
/// Each location is either an `http://`/`https://` URL or a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SourcesConfig {
    /// Sample collection (JSON array of power log rows)
    pub samples: String,

    /// Live snapshot document, periodically rewritten by the station controller
    pub snapshot: String,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout_ms: u64,
}

/// Live status inference configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StatusConfig {
    /// Snapshot poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum snapshot age still considered live, in seconds
    pub staleness_threshold_secs: u64,
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    /// IANA time zone used for calendar bucketing (e.g. "Europe/Amsterdam")
    pub timezone: String,

    /// Currency symbol attached to cost figures
    pub currency_symbol: String,

    /// Number of calendar months (including the current one) in the usage view
    pub recent_months: u32,
}

impl StatusConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        i64::try_from(self.staleness_threshold_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl SourcesConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ReportConfig {
    /// Parse the configured time zone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ChargeError::validation(
                "report.timezone",
                format!("Unknown time zone: {}", self.timezone),
            )
        })
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first location that exists
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let default_paths = ["chargeapt.yaml", "/etc/chargeapt/config.yaml"];
        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        crate::logging::parse_log_level(&self.logging.level)
            .map_err(|_| ChargeError::validation("logging.level", "Unknown log level"))?;

        if self.web.port == 0 {
            return Err(ChargeError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.sources.samples.trim().is_empty() {
            return Err(ChargeError::validation(
                "sources.samples",
                "Sample source cannot be empty",
            ));
        }

        if self.sources.snapshot.trim().is_empty() {
            return Err(ChargeError::validation(
                "sources.snapshot",
                "Snapshot source cannot be empty",
            ));
        }

        if self.sources.request_timeout_ms == 0 {
            return Err(ChargeError::validation(
                "sources.request_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.status.poll_interval_ms == 0 {
            return Err(ChargeError::validation(
                "status.poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.status.staleness_threshold_secs == 0 {
            return Err(ChargeError::validation(
                "status.staleness_threshold_secs",
                "Must be greater than 0",
            ));
        }

        if self.report.recent_months == 0 {
            return Err(ChargeError::validation(
                "report.recent_months",
                "Must be greater than 0",
            ));
        }

        self.report.tz()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.web.port, 8088);
        assert_eq!(config.status.poll_interval_ms, 10_000);
        assert_eq!(config.status.staleness_threshold_secs, 120);
        assert_eq!(config.report.timezone, "UTC");
        assert_eq!(config.report.recent_months, 12);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.sources.samples = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.report.timezone = "Mars/Olympus_Mons".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("report.timezone"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "report:\n  timezone: Europe/Amsterdam\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.report.tz().unwrap(), chrono_tz::Europe::Amsterdam);
        assert_eq!(config.report.recent_months, 12);
        assert_eq!(config.web.port, 8088);
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.status.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.status.staleness_threshold(), chrono::Duration::minutes(2));
    }
}
