//! Process startup errors.
//!
//! Anything here ends the process with a non-zero exit before the HTTP server
//! accepts a request. Request-level failures use `ApiError` instead.

use orderflow_core::{CacheError, ConfigError, StoreError};
use thiserror::Error;

use crate::jobs::BrokerError;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize tracing: {reason}")]
    Telemetry { reason: String },

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Invalid Redis address: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to create Kafka consumer: {0}")]
    Broker(#[from] BrokerError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl BootError {
    pub fn store(context: &'static str, source: StoreError) -> Self {
        BootError::Store { context, source }
    }
}

pub type BootResult<T> = Result<T, BootError>;
