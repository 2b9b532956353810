//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use allocation::{BackoffPolicy, CoordinatorConfig};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `plain` or `json` (default: `plain`)
/// - `DATABASE_URL`: Postgres URL; unset runs on the in-memory store
/// - `MAX_COMMIT_ATTEMPTS`: commit attempts per allocation (default: `5`)
/// - `SWEEP_INTERVAL_SECS`: reconciliation sweep period, `0` disables it (default: `60`)
/// - `SUBSCRIBE_BACKOFF_MS`: first reconnect delay of live streams (default: `100`)
/// - `PENDING_TTL_SECS`: how long an unconfirmed booking may hold units (default: `900`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub max_commit_attempts: usize,
    pub sweep_interval: Duration,
    pub subscribe_backoff: Duration,
    pub pending_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: env_parse("LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_commit_attempts: env_parse("MAX_COMMIT_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_commit_attempts),
            sweep_interval: env_parse("SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            subscribe_backoff: env_parse("SUBSCRIBE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.subscribe_backoff),
            pending_ttl: env_parse("PENDING_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pending_ttl),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_commit_attempts: self.max_commit_attempts,
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::default().with_initial_delay(self.subscribe_backoff)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            database_url: None,
            max_commit_attempts: CoordinatorConfig::default().max_commit_attempts,
            sweep_interval: Duration::from_secs(60),
            subscribe_backoff: Duration::from_millis(100),
            pending_ttl: Duration::from_secs(15 * 60),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
