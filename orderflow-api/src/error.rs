//! Error Types for the orderflow API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct carrying a machine-readable code and a message
//! - ErrorCode enum mapping each category to an HTTP status
//! - IntoResponse rendering the compact `{"error": "..."}` body
//! - Conversions from the domain taxonomy and request rejections

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orderflow_core::OrderError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    MSG_INTERNAL, MSG_INVALID_BODY, MSG_INVALID_ORDER, MSG_ORDER_EXISTS, MSG_ORDER_NOT_FOUND,
    MSG_ORDER_UID_REQUIRED,
};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (400)
    MissingField,
    InvalidInput,
    ValidationFailed,

    // Not found (404)
    OrderNotFound,

    // Conflict (409)
    OrderAlreadyExists,

    // Server errors (500)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::MissingField | ErrorCode::InvalidInput | ErrorCode::ValidationFailed => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::OrderNotFound => StatusCode::NOT_FOUND,
            ErrorCode::OrderAlreadyExists => StatusCode::CONFLICT,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Error returned by route handlers.
///
/// Only `message` reaches the client; `code` selects the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Wire form of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn order_uid_required() -> Self {
        Self::new(ErrorCode::MissingField, MSG_ORDER_UID_REQUIRED)
    }

    pub fn invalid_body() -> Self {
        Self::new(ErrorCode::InvalidInput, MSG_INVALID_BODY)
    }

    pub fn invalid_order() -> Self {
        Self::new(ErrorCode::ValidationFailed, MSG_INVALID_ORDER)
    }

    pub fn order_not_found() -> Self {
        Self::new(ErrorCode::OrderNotFound, MSG_ORDER_NOT_FOUND)
    }

    pub fn order_exists() -> Self {
        Self::new(ErrorCode::OrderAlreadyExists, MSG_ORDER_EXISTS)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.message,
        });
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Domain errors never leak their internal detail to clients.
impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidOrder(_) => ApiError::invalid_order(),
            OrderError::Decode { .. } => ApiError::invalid_body(),
            OrderError::DuplicateOrder { .. } => ApiError::order_exists(),
            OrderError::NotFound { .. } => ApiError::order_not_found(),
            OrderError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                ApiError::database_error(MSG_INTERNAL)
            }
            OrderError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                ApiError::internal_error(MSG_INTERNAL)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Invalid request body");
        ApiError::invalid_body()
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::{StoreError, ValidationErrors};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OrderNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::OrderAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_error_conversion() {
        let err = ApiError::from(OrderError::DuplicateOrder {
            order_uid: "A1".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.message, "order already exists");

        let err = ApiError::from(OrderError::InvalidOrder(ValidationErrors::new()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "invalid order data");

        let err = ApiError::from(OrderError::Store(StoreError::Unavailable {
            reason: "connection refused on 10.0.0.3".to_string(),
        }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = ApiError::order_not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"error":"order not found"}"#);
    }
}
