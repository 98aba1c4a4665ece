//! Ledger entry handlers

use super::types::{ApiResponse, LedgerEntryRequest, LedgerPage, LedgerQuery};
use crate::{
    activity::RequestOrigin,
    auth::AuthUser,
    error::{ApiError, ApiResult, JsonBody},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger_core::{
    not_found_error, AuditLevel, LedgerEntry, LedgerError, Page, PageRequest,
};
use tracing::{info, warn};

async fn load_entry(state: &AppState, id: i64) -> ApiResult<LedgerEntry> {
    state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| ApiError(not_found_error!("Entry", "ledger")))
}

/// Enforce the ownership rule for a mutation
fn ensure_can_modify(user: &AuthUser, entry: &LedgerEntry) -> ApiResult<()> {
    if user.can_modify(entry.user_id) {
        return Ok(());
    }
    warn!(
        user_id = user.id,
        entry_id = entry.id,
        owner_id = entry.user_id,
        "Ownership check failed"
    );
    Err(ApiError(LedgerError::forbidden("Access denied", "ledger")))
}

/// List ledger entries
#[utoipa::path(
    get,
    path = "/api/ledger",
    tag = "Ledger",
    summary = "List ledger entries",
    description = "Filtered, paginated listing ordered by creation time, newest first",
    params(LedgerQuery),
    responses(
        (status = 200, description = "One page of entries", body = LedgerPage),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<ApiResponse<LedgerPage>> {
    let pagination = &state.config.pagination;
    let page = PageRequest::resolve(
        query.page.as_deref(),
        query.page_size.as_deref(),
        pagination.default_page_size,
        pagination.max_page_size,
    );

    let (items, total) = state.ledger.search(&query.filter(None), page).await?;
    Ok(ApiResponse::ok(Page::new(items, total, page).into()))
}

/// Get a single entry
#[utoipa::path(
    get,
    path = "/api/ledger/{id}",
    tag = "Ledger",
    summary = "Get ledger entry",
    params(("id" = i64, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "The entry", body = LedgerEntry),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<LedgerEntry>> {
    Ok(ApiResponse::ok(load_entry(&state, id).await?))
}

/// Create an entry owned by the caller
#[utoipa::path(
    post,
    path = "/api/ledger",
    tag = "Ledger",
    summary = "Create ledger entry",
    request_body = LedgerEntryRequest,
    responses(
        (status = 201, description = "Entry created", body = LedgerEntry),
        (status = 400, description = "Missing field or invalid date")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_entry(
    State(state): State<AppState>,
    user: AuthUser,
    origin: RequestOrigin,
    JsonBody(request): JsonBody<LedgerEntryRequest>,
) -> ApiResult<(StatusCode, ApiResponse<LedgerEntry>)> {
    let new_entry = request.into_new_entry()?;

    // The token may outlive the account it was issued for
    if state.users.find_by_id(user.id).await?.is_none() {
        return Err(ApiError(not_found_error!("User", "ledger")));
    }

    let entry = state.ledger.insert(user.id, &new_entry).await?;
    info!(entry_id = entry.id, user_id = user.id, "Ledger entry created");
    state
        .activity
        .record(
            AuditLevel::Info,
            &format!("Created ledger entry: {}", entry.id),
            Some(user.id),
            &origin,
        )
        .await;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Entry created successfully", entry),
    ))
}

/// Partially update an entry
#[utoipa::path(
    put,
    path = "/api/ledger/{id}",
    tag = "Ledger",
    summary = "Update ledger entry",
    description = "Basic users may only update their own entries",
    params(("id" = i64, Path, description = "Entry ID")),
    request_body = LedgerEntryRequest,
    responses(
        (status = 200, description = "Entry updated", body = LedgerEntry),
        (status = 400, description = "Invalid date"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_entry(
    State(state): State<AppState>,
    user: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<LedgerEntryRequest>,
) -> ApiResult<ApiResponse<LedgerEntry>> {
    let existing = load_entry(&state, id).await?;
    ensure_can_modify(&user, &existing)?;

    let changes = request.into_changes()?;
    let entry = state.ledger.update(id, &changes).await?;
    info!(entry_id = id, user_id = user.id, "Ledger entry updated");
    state
        .activity
        .record(
            AuditLevel::Info,
            &format!("Updated ledger entry: {}", id),
            Some(user.id),
            &origin,
        )
        .await;

    Ok(ApiResponse::with_message("Entry updated successfully", entry))
}

/// Delete an entry
#[utoipa::path(
    delete,
    path = "/api/ledger/{id}",
    tag = "Ledger",
    summary = "Delete ledger entry",
    description = "Basic users may only delete their own entries",
    params(("id" = i64, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    user: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    let existing = load_entry(&state, id).await?;
    ensure_can_modify(&user, &existing)?;

    state.ledger.delete(id).await?;
    info!(entry_id = id, user_id = user.id, "Ledger entry deleted");
    state
        .activity
        .record(
            AuditLevel::Info,
            &format!("Deleted ledger entry: {}", id),
            Some(user.id),
            &origin,
        )
        .await;

    Ok(ApiResponse::message("Entry deleted successfully"))
}
