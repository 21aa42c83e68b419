//! REST API Routes Module
//!
//! Includes:
//! - Order lookup and creation
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - The static browser UI under `/` and `/web`

pub mod health;
pub mod order;

use std::path::Path;

use axum::{middleware::from_fn, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::HttpConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use order::create_router as order_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json when Swagger UI is not serving it.
#[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Static UI: `/` serves `index.html`, `/web/*` serves the directory.
///
/// A missing directory yields 404s, never a boot failure.
fn static_routes(web_dir: &Path) -> Router<AppState> {
    Router::new()
        .route_service("/", ServeFile::new(web_dir.join("index.html")))
        .nest_service("/web", ServeDir::new(web_dir))
}

/// Create the complete router.
///
/// - Order routes at /order/{order_uid} and /orders
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json, Swagger UI at /swagger-ui
/// - Browser UI at / and /web/*
pub fn create_api_router(state: AppState, config: &HttpConfig) -> Router {
    let mut router = Router::new()
        .merge(order::create_router())
        .nest("/health", health::create_router())
        .merge(static_routes(Path::new(&config.web_dir)))
        .route("/metrics", get(metrics_handler));

    #[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/openapi.json", crate::openapi::ApiDoc::openapi()),
        );
    }

    router
        .layer(ServiceBuilder::new().layer(from_fn(observability_middleware)))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use orderflow_storage::{InMemoryOrderCache, InMemoryOrderRepository};
    use tower::ServiceExt;

    fn router(web_dir: &str) -> Router {
        let state = AppState::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryOrderCache::new()),
        );
        let config = HttpConfig {
            web_dir: web_dir.to_string(),
            ..HttpConfig::default()
        };
        create_api_router(state, &config)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_missing_web_dir_is_not_fatal() {
        let (status, _) = get(router("/nonexistent/orderflow-web"), "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(router("/nonexistent/orderflow-web"), "/web/app.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_web_dir_is_served() {
        let dir = std::env::temp_dir().join(format!("orderflow-web-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>orders</h1>").unwrap();
        std::fs::write(dir.join("app.js"), "lookup()").unwrap();
        let web_dir = dir.to_string_lossy().to_string();

        let (status, body) = get(router(&web_dir), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>orders</h1>");

        let (status, body) = get(router(&web_dir), "/web/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"lookup()");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, body) = get(router("./web"), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("orderflow_"));
    }

    #[cfg(feature = "openapi")]
    #[tokio::test]
    async fn test_openapi_json_is_served() {
        let (status, body) = get(router("./web"), "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/order/{order_uid}"].is_object());
    }
}
