//! OpenAPI Specification for the orderflow API
//!
//! Generated by utoipa from the route annotations and the order types.

use utoipa::OpenApi;

use crate::error::ErrorBody;
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::order::CreatedResponse;
use crate::routes::{health, order};
use crate::telemetry::metrics;
use orderflow_core::{Delivery, Item, Order, Payment};

/// OpenAPI document for the orderflow API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "orderflow API",
        version = "0.1.0",
        description = "Order ingestion and read-through lookup service"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Orders", description = "Order lookup and creation"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        order::get_order,
        order::create_order,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        Order,
        Delivery,
        Payment,
        Item,
        CreatedResponse,
        ErrorBody,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON form of the document.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "orderflow API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 3);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.schemas.contains_key("Order"));
        assert!(components.schemas.contains_key("ErrorBody"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.paths.paths.contains_key("/order/{order_uid}"));
        assert!(openapi.paths.paths.contains_key("/orders"));
        assert!(openapi.paths.paths.contains_key("/health/ready"));
        assert!(openapi.paths.paths.contains_key("/metrics"));
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("orderflow API"));
        Ok(())
    }
}
