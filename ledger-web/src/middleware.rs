//! Request middleware: the role gate and debug error exposure

use crate::{
    auth::{jwt::JwtService, AuthUser, RoleSet},
    handlers::types::ApiResponse,
};
use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

/// State of a [`role_guard`] layer: the verifier and the admitted roles
#[derive(Debug, Clone)]
pub struct Gate {
    pub jwt: JwtService,
    pub allowed: RoleSet,
}

impl Gate {
    pub fn new(jwt: JwtService, allowed: RoleSet) -> Self {
        Self { jwt, allowed }
    }
}

/// Authorization gate in front of a route group.
///
/// Preflight `OPTIONS` requests short-circuit with 204. Otherwise the bearer
/// token must verify (401) and its role must be admitted (403). The handler
/// only runs when both hold, with the caller stored in the request extensions.
pub async fn role_guard(State(gate): State<Gate>, mut request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let user = match gate
        .jwt
        .verify_header(request.headers())
        .and_then(|claims| AuthUser::from_claims(&claims))
    {
        Ok(user) => user,
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Rejected unauthenticated request");
            return e.into_response();
        }
    };

    if !gate.allowed.allows(user.role) {
        warn!(
            user_id = user.id,
            role = %user.role,
            path = %request.uri().path(),
            "Insufficient permissions"
        );
        return ApiResponse::failure_response(
            StatusCode::FORBIDDEN,
            "Insufficient permissions",
            "FORBIDDEN",
        );
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Internal detail attached to 500 responses; only rendered in debug mode
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Rewrite 500 responses to include their [`ErrorDetail`]. Installed only
/// when `server.debug` is on.
pub async fn expose_error_details(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<ErrorDetail>() {
        Some(ErrorDetail(detail)) if response.status().is_server_error() => {
            let status = response.status();
            let mut body = ApiResponse::failure(status, "Internal server error", "INTERNAL_ERROR");
            body.error = Some(detail);
            (status, body).into_response()
        }
        _ => response,
    }
}
