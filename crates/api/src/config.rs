//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps orders in memory
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `TRANSPORT_PARTITIONS`: partitions of the event transport (default: `3`)
/// - `CONSUMER_GROUP`: consumer group name (default: `"order-service"`)
/// - `CONSUMER_MAX_ATTEMPTS`: deliveries per event before it is skipped (default: `5`)
/// - `REQUEST_TIMEOUT_MS`: per-request deadline in milliseconds (default: `15000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub transport_partitions: usize,
    pub consumer_group: String,
    pub consumer_max_attempts: u32,
    pub request_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parsed(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")
                .filter(|&n: &u32| n > 0)
                .unwrap_or(defaults.database_max_connections),
            transport_partitions: parsed(&lookup, "TRANSPORT_PARTITIONS")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.transport_partitions),
            consumer_group: lookup("CONSUMER_GROUP")
                .filter(|group| !group.trim().is_empty())
                .unwrap_or(defaults.consumer_group),
            consumer_max_attempts: parsed(&lookup, "CONSUMER_MAX_ATTEMPTS")
                .filter(|&n: &u32| n > 0)
                .unwrap_or(defaults.consumer_max_attempts),
            request_timeout: parsed(&lookup, "REQUEST_TIMEOUT_MS")
                .filter(|&ms: &u64| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
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
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            transport_partitions: 3,
            consumer_group: "order-service".to_string(),
            consumer_max_attempts: 5,
            request_timeout: Duration::from_millis(15_000),
        }
    }
}
