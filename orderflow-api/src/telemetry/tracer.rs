//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{env_lookup, var};
use crate::boot::{BootError, BootResult};

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "orderflow_api=info,tower_http=info,info";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    /// `LOG_FORMAT`: `json` or `pretty` (default: json). Unknown values fall
    /// back to json.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match var(lookup, "LOG_FORMAT").map(|s| s.to_lowercase()) {
            Some(ref s) if s == "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        Self { log_format }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> BootResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| BootError::Telemetry {
        reason: e.to_string(),
    })?;

    tracing::info!(log_format = ?config.log_format, "Telemetry initialized");
    Ok(())
}
