//! Background Jobs for orderflow
//!
//! - `ingest`: the broker-to-store ingestion worker
//! - `source`: the broker abstraction the worker consumes from
//! - `kafka`: the Kafka consumer-group implementation
//!
//! # Usage
//!
//! ```ignore
//! use orderflow_api::jobs::{IngestWorker, KafkaConfig, KafkaSource};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let source = Arc::new(KafkaSource::new(&KafkaConfig::from_env())?);
//! let worker = IngestWorker::new(source, save_service);
//! let handle = tokio::spawn(worker.run(shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let snapshot = handle.await?;
//! ```

pub mod ingest;
pub mod kafka;
pub mod source;

pub use ingest::{
    classify, Disposition, IngestConfig, IngestMetrics, IngestSnapshot, IngestWorker, Outcome,
    RetryBackoff,
};
pub use kafka::{KafkaConfig, KafkaSource};
pub use source::{BrokerError, BrokerResult, InMemorySource, IncomingMessage, MessageSource};
