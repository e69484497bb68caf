//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Process configuration with defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT` (default `0.0.0.0:3000`)
/// - `RUST_LOG` (default `info`)
/// - `DATABASE_URL`; unset selects the in-memory backend
/// - `ASSIGN_INTERVAL_MS`, `MOVE_INTERVAL_MS`, `OUTBOX_INTERVAL_MS`
/// - `OUTBOX_BATCH_SIZE`, `GEO_TIMEOUT_MS`
/// - `KAFKA_BROKERS`, `KAFKA_TOPIC` (only with the `kafka` feature)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub assign_interval: Duration,
    pub move_interval: Duration,
    pub outbox_interval: Duration,
    pub outbox_batch_size: usize,
    pub geo_timeout: Duration,
    pub kafka_brokers: Option<String>,
    pub kafka_topic: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            assign_interval: millis("ASSIGN_INTERVAL_MS", defaults.assign_interval),
            move_interval: millis("MOVE_INTERVAL_MS", defaults.move_interval),
            outbox_interval: millis("OUTBOX_INTERVAL_MS", defaults.outbox_interval),
            outbox_batch_size: parsed("OUTBOX_BATCH_SIZE")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.outbox_batch_size),
            geo_timeout: millis("GEO_TIMEOUT_MS", defaults.geo_timeout),
            kafka_brokers: non_empty("KAFKA_BROKERS"),
            kafka_topic: non_empty("KAFKA_TOPIC").unwrap_or(defaults.kafka_topic),
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
            database_url: None,
            assign_interval: Duration::from_millis(1000),
            move_interval: Duration::from_millis(2000),
            outbox_interval: Duration::from_millis(1000),
            outbox_batch_size: application::DEFAULT_BATCH_SIZE,
            geo_timeout: Duration::from_millis(5000),
            kafka_brokers: None,
            kafka_topic: "order.status.changed".to_string(),
        }
    }
}
