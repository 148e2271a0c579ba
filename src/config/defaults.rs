use super::*;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/chargeapt.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            samples: "http://127.0.0.1:8000/power-logs/?skip=0&limit=10000".to_string(),
            snapshot: "/var/lib/chargeapt/meter_values.json".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            staleness_threshold_secs: 120,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            currency_symbol: "€".to_string(),
            recent_months: 12,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            sources: SourcesConfig::default(),
            status: StatusConfig::default(),
            report: ReportConfig::default(),
        }
    }
}
