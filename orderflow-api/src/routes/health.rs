//! Health Check Endpoints
//!
//! Kubernetes-compatible health endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Store and cache connectivity
//!
//! Readiness fails only when the store is unreachable. A cache outage is
//! reported as degraded because lookups fall through to the store.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub store: ComponentHealth,
    pub cache: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_check(result: Result<u64, String>, failed: HealthStatus) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: failed,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

/// Overall status: the store decides readiness, the cache can only degrade it.
fn overall_status(store: &ComponentHealth, cache: &ComponentHealth) -> HealthStatus {
    if store.status != HealthStatus::Healthy {
        HealthStatus::Unhealthy
    } else if cache.status != HealthStatus::Healthy {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready, possibly without cache", body = HealthResponse),
        (status = 503, description = "Store is unreachable", body = HealthResponse),
    ),
))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = ComponentHealth::from_check(check_store(&state).await, HealthStatus::Unhealthy);
    let cache = ComponentHealth::from_check(check_cache(&state).await, HealthStatus::Degraded);

    let status = overall_status(&store, &cache);
    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            store,
            cache,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

async fn check_store(state: &AppState) -> Result<u64, String> {
    let start = Instant::now();
    match state.repo.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Store check failed: {}", e)),
    }
}

async fn check_cache(state: &AppState) -> Result<u64, String> {
    let start = Instant::now();
    match state.cache.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Cache check failed: {}", e)),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: HealthStatus) -> ComponentHealth {
        ComponentHealth {
            status,
            latency_ms: None,
            error: None,
        }
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Degraded,
            message: None,
            details: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"status":"degraded"}"#);
    }

    #[test]
    fn test_overall_status() {
        use HealthStatus::*;
        assert_eq!(overall_status(&component(Healthy), &component(Healthy)), Healthy);
        assert_eq!(overall_status(&component(Healthy), &component(Degraded)), Degraded);
        assert_eq!(overall_status(&component(Unhealthy), &component(Healthy)), Unhealthy);
        assert_eq!(overall_status(&component(Unhealthy), &component(Degraded)), Unhealthy);
    }

    #[test]
    fn test_failed_check_carries_error() {
        let health = ComponentHealth::from_check(
            Err("Cache check failed: refused".to_string()),
            HealthStatus::Degraded,
        );
        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("\"status\":\"degraded\""));
        assert!(json.contains("refused"));
        assert!(!json.contains("latency_ms"));
    }
}
