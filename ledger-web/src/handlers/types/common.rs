//! Common types used across multiple handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// JSON envelope carried by every JSON response.
///
/// `code` is `0` on success and the HTTP status on failure. `error` holds a
/// machine-readable code and is omitted on success.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_message("OK", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            code: 0,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: 0,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, error: &str) -> Self {
        Self {
            success: false,
            code: status.as_u16(),
            message: message.into(),
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// Failure envelope paired with its status
    pub fn failure_response(status: StatusCode, message: impl Into<String>, error: &str) -> Response {
        (status, Json(Self::failure(status, message, error))).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Whether the database answered a probe
    pub database: bool,
}
