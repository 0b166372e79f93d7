use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::ws::{BridgeConfig, OverflowPolicy};

/// Errors raised while loading [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for streaming connections to close on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Redis connection URL. When unset, in-memory store and bus are used.
    pub redis_url: Option<String>,
    /// Per-connection streaming bridge settings.
    pub bridge: BridgeConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default       |
    /// |-------------------------|---------------|
    /// | `HOST`                  | `0.0.0.0`     |
    /// | `PORT`                  | `8080`        |
    /// | `CORS_ORIGINS`          | `*`           |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`          |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`          |
    /// | `REDIS_URL`             | unset         |
    /// | `WS_BUFFER_CAPACITY`    | `256` (1 to 65536) |
    /// | `WS_OVERFLOW_POLICY`    | `drop_oldest` |
    /// | `WS_PING_INTERVAL_SECS` | `30`          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", "8080")?;

        let cors_raw = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into());
        let cors_origins = parse_origins(&cors_raw)?;

        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "30")?;
        let shutdown_timeout_secs: u64 = parse_var("SHUTDOWN_TIMEOUT_SECS", "10")?;

        let redis_url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let buffer_capacity = check_buffer_capacity(parse_var("WS_BUFFER_CAPACITY", "256")?)?;
        let overflow_policy: OverflowPolicy = parse_var("WS_OVERFLOW_POLICY", "drop_oldest")?;
        let ping_interval_secs: u64 = parse_var("WS_PING_INTERVAL_SECS", "30")?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            redis_url,
            bridge: BridgeConfig {
                buffer_capacity,
                overflow_policy,
                ping_interval: Duration::from_secs(ping_interval_secs.max(1)),
            },
        })
    }
}

/// Largest accepted `WS_BUFFER_CAPACITY`. Every connection allocates its
/// hand-off up front.
pub const MAX_BUFFER_CAPACITY: usize = 65_536;

fn check_buffer_capacity(capacity: usize) -> Result<usize, ConfigError> {
    if (1..=MAX_BUFFER_CAPACITY).contains(&capacity) {
        Ok(capacity)
    } else {
        Err(ConfigError::Invalid {
            var: "WS_BUFFER_CAPACITY",
            value: capacity.to_string(),
            reason: format!("must be between 1 and {MAX_BUFFER_CAPACITY}"),
        })
    }
}

/// Read `var` (falling back to `default`) and parse it.
fn parse_var<T>(var: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = std::env::var(var).unwrap_or_else(|_| default.into());
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.clone(),
        reason: e.to_string(),
    })
}

/// Split a comma-separated origin list, rejecting values that are not valid
/// header values.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|e| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_origins_trims_and_skips_empty() {
        let origins = parse_origins(" http://a.test , ,http://b.test").unwrap();
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn buffer_capacity_must_be_within_bounds() {
        assert_eq!(check_buffer_capacity(1).unwrap(), 1);
        assert_eq!(
            check_buffer_capacity(MAX_BUFFER_CAPACITY).unwrap(),
            MAX_BUFFER_CAPACITY
        );
        assert_matches!(
            check_buffer_capacity(0),
            Err(ConfigError::Invalid { var: "WS_BUFFER_CAPACITY", .. })
        );
        assert_matches!(
            check_buffer_capacity(MAX_BUFFER_CAPACITY + 1),
            Err(ConfigError::Invalid { var: "WS_BUFFER_CAPACITY", .. })
        );
        assert!(check_buffer_capacity(usize::MAX).is_err());
    }

    #[test]
    fn parse_origins_rejects_control_characters() {
        assert!(parse_origins("http://bad\n.test").is_err());
    }
}
