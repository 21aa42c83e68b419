//! orderflow Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the HTTP
//! surface and the ingestion pipeline.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, with_metrics, OrderflowMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
