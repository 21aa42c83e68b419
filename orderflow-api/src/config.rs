//! Service Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for the docker-compose development stack. Only the Postgres credentials are
//! required; everything else falls back to a default.
//!
//! Every loader takes a lookup closure so tests can supply variables without
//! touching the process environment.

use std::time::Duration;

use orderflow_core::ConfigError;

use crate::cache::CacheConfig;
use crate::constants::{DEFAULT_HTTP_PORT, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WEB_DIR};
use crate::db::DbConfig;
use crate::jobs::KafkaConfig;
use crate::telemetry::TelemetryConfig;

// ============================================================================
// LOOKUP HELPERS
// ============================================================================

/// Read a variable, treating empty or whitespace-only values as unset.
pub(crate) fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn var_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable, falling back to `default` when unset or unparsable.
pub(crate) fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    var(lookup, key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(lookup, key).ok_or_else(|| ConfigError::MissingRequired {
        field: key.to_string(),
    })
}

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse a duration such as `10s`, `500ms`, `1m30s` or `2h`.
///
/// A bare number is taken as seconds. Values that do not fit in a
/// `Duration` are rejected rather than clamped.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return None;
        }
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: f64 = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        let nanos = value * nanos_per_unit;
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return None;
        }
        total = total.checked_add(Duration::from_nanos(nanos as u64))?;
    }
    Some(total)
}

// ============================================================================
// HTTP CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub port: u16,
    /// Grace period for draining in-flight requests.
    pub shutdown_timeout: Duration,
    /// Directory holding the browser UI (`index.html` and assets).
    pub web_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            web_dir: DEFAULT_WEB_DIR.to_string(),
        }
    }
}

impl HttpConfig {
    /// Environment variables:
    /// - `HTTP_PORT`: `8080` or `:8080` (default: 8080)
    /// - `SHUTDOWN_TIMEOUT`: duration such as `10s` (default: 10s)
    /// - `WEB_DIR`: static UI directory (default: ./web)
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match var(lookup, "HTTP_PORT") {
            Some(raw) => raw
                .trim_start_matches(':')
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "HTTP_PORT".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_HTTP_PORT,
        };

        let shutdown_timeout = match var(lookup, "SHUTDOWN_TIMEOUT") {
            Some(raw) => parse_duration(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "SHUTDOWN_TIMEOUT".to_string(),
                value: raw.clone(),
                reason: "expected a duration such as 10s or 500ms".to_string(),
            })?,
            None => DEFAULT_SHUTDOWN_TIMEOUT,
        };

        Ok(Self {
            port,
            shutdown_timeout,
            web_dir: var_or(lookup, "WEB_DIR", DEFAULT_WEB_DIR),
        })
    }

    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Everything the binary needs to boot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub db: DbConfig,
    pub kafka: KafkaConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            http: HttpConfig::from_lookup(lookup)?,
            db: DbConfig::from_lookup(lookup)?,
            kafka: KafkaConfig::from_lookup(lookup),
            cache: CacheConfig::from_lookup(lookup),
            telemetry: TelemetryConfig::from_lookup(lookup),
        })
    }
}
