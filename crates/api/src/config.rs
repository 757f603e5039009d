//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::SagaConfig;

/// Log output format, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default `0.0.0.0`) and `PORT` (default `3000`)
/// - `RUST_LOG` tracing filter (default `info`)
/// - `LOG_FORMAT` `text` or `json` (default `text`)
/// - `QUERY_TTL_HOURS` (24), `SWEEP_INTERVAL_SECS` (60)
/// - `NOTIFY_MAX_ATTEMPTS` (3), `NOTIFY_BACKOFF_MS` (200)
/// - `DEFAULT_LEAD_TIME_DAYS` (5)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub saga: SagaConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let mut saga = defaults.saga;
        if let Some(hours) = parsed("QUERY_TTL_HOURS") {
            saga = saga.with_query_ttl(chrono::Duration::hours(hours as i64));
        }
        if let Some(secs) = parsed("SWEEP_INTERVAL_SECS").filter(|s| *s > 0) {
            saga.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(attempts) = parsed("NOTIFY_MAX_ATTEMPTS") {
            saga = saga.with_notify_max_attempts(attempts as u32);
        }
        if let Some(ms) = parsed("NOTIFY_BACKOFF_MS") {
            saga = saga.with_notify_backoff(Duration::from_millis(ms));
        }
        if let Some(days) = parsed("DEFAULT_LEAD_TIME_DAYS") {
            saga.default_lead_time_days = days as u32;
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            saga,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            saga: SagaConfig::default(),
        }
    }
}
