//! Prometheus Metrics Definitions
//!
//! Defines all orderflow metrics with their labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<OrderflowMetrics>> = Lazy::new(OrderflowMetrics::new);

/// Container for all orderflow metrics.
#[derive(Clone)]
pub struct OrderflowMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Ingested messages by outcome - labels: outcome
    /// (saved, duplicate, invalid, poison, retry)
    pub ingest_messages_total: CounterVec,

    /// Cache lookups on the read path - labels: result (hit, miss, error)
    pub cache_lookups_total: CounterVec,

    /// Orders written to the cache by the last warm-up
    pub cache_warmed_orders: Gauge,
}

impl OrderflowMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "orderflow_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "orderflow_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            ingest_messages_total: register_counter_vec!(
                "orderflow_ingest_messages_total",
                "Broker messages processed by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register ingest_messages_total: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "orderflow_cache_lookups_total",
                "Read-path cache lookups by result",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            cache_warmed_orders: register_gauge!(
                "orderflow_cache_warmed_orders",
                "Orders loaded into the cache by the last warm-up"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_warmed_orders: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_ingest(&self, outcome: &str) {
        self.ingest_messages_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn set_warmed_orders(&self, count: usize) {
        self.cache_warmed_orders.set(count as f64);
    }
}

/// Run `f` against the global metrics, skipping silently if registration
/// failed. Metrics never break the request or ingestion path.
pub fn with_metrics<F: FnOnce(&OrderflowMetrics)>(f: F) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Registers the orderflow collectors even before the first request.
    Lazy::force(&METRICS);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
