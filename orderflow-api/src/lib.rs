//! orderflow API - Order Ingestion and Lookup Service
//!
//! Consumes orders from a Kafka topic, persists each aggregate atomically in
//! PostgreSQL, keeps a Redis copy for fast lookups, and serves
//! `GET /order/{order_uid}` through a read-through cache.
//!
//! The repository and cache are injected as trait objects, so the same use
//! cases run against Postgres/Redis in production and the in-memory tiers
//! from `orderflow-storage` in tests.

#[macro_use]
mod macros;

pub mod boot;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod migrations;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod state;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use boot::{BootError, BootResult};
pub use cache::{CacheConfig, RedisOrderCache};
pub use config::{AppConfig, HttpConfig};
pub use db::{DbConfig, PgOrderRepository};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{IngestWorker, KafkaConfig, KafkaSource, MessageSource};
pub use migrations::run_migrations;
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{CacheWarmer, GetOrderService, SaveOrderService, SaveOutcome, WarmReport};
pub use state::AppState;
pub use validation::Validate;
