//! Order REST API Routes

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use orderflow_core::{Order, OrderError};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ORDER_BODY_BYTES, MSG_GET_FAILED};
#[cfg(feature = "openapi")]
use crate::error::ErrorBody;
use crate::error::{ApiError, ApiResult};
use crate::services::{GetOrderService, SaveOrderService};
use crate::state::AppState;

/// Body returned by `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreatedResponse {
    pub order_uid: String,
    pub status: String,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /order/{order_uid} - Look up one order
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/order/{order_uid}",
    tag = "Orders",
    params(
        ("order_uid" = String, Path, description = "Order identifier")
    ),
    responses(
        (status = 200, description = "Order found", body = Order),
        (status = 400, description = "Missing order_uid", body = ErrorBody),
        (status = 404, description = "Order not found", body = ErrorBody),
        (status = 500, description = "Lookup failed", body = ErrorBody),
    ),
))]
pub async fn get_order(
    State(service): State<GetOrderService>,
    Path(order_uid): Path<String>,
) -> ApiResult<Json<Order>> {
    // Blank means missing; anything else is looked up verbatim.
    if order_uid.trim().is_empty() {
        return Err(ApiError::order_uid_required());
    }
    let order_uid = order_uid.as_str();

    match service.execute(order_uid).await {
        Ok(order) => Ok(Json(order)),
        Err(OrderError::NotFound { .. }) => Err(ApiError::order_not_found()),
        Err(e) => {
            tracing::error!(order_uid, error = %e, "Failed to get order");
            Err(ApiError::database_error(MSG_GET_FAILED))
        }
    }
}

/// GET /order/ - A lookup without an identifier
async fn missing_order_uid() -> ApiError {
    ApiError::order_uid_required()
}

/// POST /orders - Create a new order
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    request_body = Order,
    responses(
        (status = 201, description = "Order created", body = CreatedResponse),
        (status = 400, description = "Malformed body or invalid order", body = ErrorBody),
        (status = 409, description = "Order already exists", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
))]
pub async fn create_order(
    State(service): State<SaveOrderService>,
    payload: Result<Json<Order>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(order) = payload?;

    service.execute(&order).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            order_uid: order.order_uid,
            status: "created".to_string(),
        }),
    ))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/order/:order_uid", get(get_order))
        .route("/order", get(missing_order_uid))
        .route("/order/", get(missing_order_uid))
        .route(
            "/orders",
            post(create_order).layer(DefaultBodyLimit::max(MAX_ORDER_BODY_BYTES)),
        )
}
