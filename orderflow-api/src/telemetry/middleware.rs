//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a tracing span and records Prometheus metrics
//! under a normalized path label.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

/// Normalize path for metrics/spans.
///
/// Order UIDs and static asset names are replaced with placeholders, and any
/// path the router does not serve collapses to a single label, so clients
/// cannot grow Prometheus label sets without bound.
pub(crate) fn normalize_path(path: &str) -> String {
    const FIXED: &[&str] = &[
        "/",
        "/orders",
        "/metrics",
        "/openapi.json",
        "/health/ping",
        "/health/live",
        "/health/ready",
    ];

    if FIXED.contains(&path) {
        return path.to_string();
    }
    if path.starts_with("/order/") {
        return "/order/{order_uid}".to_string();
    }
    if path.starts_with("/web/") {
        return "/web/{file}".to_string();
    }
    if path.starts_with("/swagger-ui") {
        return "/swagger-ui".to_string();
    }
    "{unmatched}".to_string()
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|m| {
        m.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        )
    });

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
