//! Health check handler

use super::types::{ApiResponse, HealthResponse};
use crate::AppState;
use axum::extract::State;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    summary = "Health check",
    description = "Liveness probe, also reports whether the database answers",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let database = state.database.ping().await;
    ApiResponse::ok(HealthResponse {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}
