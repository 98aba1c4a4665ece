//! Mapping of core errors onto HTTP responses

use crate::{auth::jwt::AuthError, handlers::types::ApiResponse, middleware::ErrorDetail};
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledger_core::{ErrorKind, LedgerError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Handler error. Wraps [`LedgerError`] so handlers can use `?` on core and
/// store results.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self.0.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "UNAUTHORIZED",
            ErrorKind::Authorization => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        Self(error)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self(error.into())
    }
}

/// Malformed, mistyped or non-JSON bodies are validation failures
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LedgerError::validation(
            format!("Invalid request body: {}", rejection.body_text()),
            "body",
            "api",
        ))
    }
}

/// `Json` extractor whose rejection is rendered as an [`ApiError`] envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let status = self.status();

        if status.is_server_error() {
            let detail = match std::error::Error::source(&self.0) {
                Some(source) => format!("{}: {}", self.0, source),
                None => self.0.to_string(),
            };
            let mut response = ApiResponse::failure_response(
                status,
                "Internal server error",
                self.error_code(),
            );
            response.extensions_mut().insert(ErrorDetail(detail));
            return response;
        }

        ApiResponse::failure_response(status, self.0.message(), self.error_code())
    }
}
