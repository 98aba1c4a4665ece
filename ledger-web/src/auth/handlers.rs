//! Authentication handlers for registration, login and password changes

use super::{
    users::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
    AuthUser,
};
use crate::{
    activity::RequestOrigin,
    error::{ApiResult, JsonBody},
    handlers::types::ApiResponse,
    AppState,
};
use axum::{extract::State, http::StatusCode};
use ledger_core::{AuditLevel, ErrorKind, UserProfile};
use tracing::{info, warn};

/// User registration endpoint
///
/// New accounts always start with the `user` role.
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Auth",
    summary = "Register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserProfile),
        (status = 400, description = "Missing field, bad username length or weak password"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    origin: RequestOrigin,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, ApiResponse<UserProfile>)> {
    let profile = state.accounts.register(request).await?;

    state
        .activity
        .record(
            AuditLevel::Info,
            &format!("New user registered: {}", profile.username),
            Some(profile.id),
            &origin,
        )
        .await;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", profile),
    ))
}

/// User login endpoint
///
/// Returns a bearer token whose role claim is the role stored at this moment.
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    origin: RequestOrigin,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<ApiResponse<LoginResponse>> {
    let username = request
        .username
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    match state.accounts.login(request).await {
        Ok((account, response)) => {
            info!(user_id = account.id, username = %account.username, "User logged in");
            state
                .activity
                .record(
                    AuditLevel::Info,
                    &format!("User logged in: {}", account.username),
                    Some(account.id),
                    &origin,
                )
                .await;
            Ok(ApiResponse::with_message("Login successful", response))
        }
        Err(e) if e.kind() == ErrorKind::Authentication => {
            warn!(username = %username, "Failed login attempt");
            state
                .activity
                .record(
                    AuditLevel::Warning,
                    &format!("Failed login attempt for username: {}", username),
                    None,
                    &origin,
                )
                .await;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Current caller's profile, read fresh from the credential store
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Auth",
    summary = "Current user",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(state.accounts.profile(user.id).await?))
}

/// Change the caller's own password
#[utoipa::path(
    post,
    path = "/api/change-password",
    tag = "Auth",
    summary = "Change password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Missing field or weak password"),
        (status = 401, description = "Old password is incorrect")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    origin: RequestOrigin,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    state.accounts.change_password(user.id, request).await?;

    state
        .activity
        .record(
            AuditLevel::Info,
            &format!("Password changed for user: {}", user.username),
            Some(user.id),
            &origin,
        )
        .await;

    Ok(ApiResponse::message("Password changed successfully"))
}
