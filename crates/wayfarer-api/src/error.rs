//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error shape and maps
//! pipeline errors to HTTP status codes.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use wayfarer_chat::ChatError;
use wayfarer_core::error::WayfarerError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed body or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - unknown route or resource.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - a backing component is not ready.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), message = %message, "Request failed");
        }

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            ChatError::Catalog(msg) => ApiError::ServiceUnavailable(msg),
            ChatError::Timeout(ms) => {
                ApiError::ServiceUnavailable(format!("operation timed out after {} ms", ms))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WayfarerError> for ApiError {
    fn from(err: WayfarerError) -> Self {
        match err {
            WayfarerError::InvalidValue { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
