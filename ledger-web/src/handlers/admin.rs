//! Administration handlers: users, statistics and the activity log

use super::types::{
    AdminLogsQuery, AdminUserPage, AdminUsersQuery, ApiResponse, EntryStatistics, ExportQuery,
    LogPage, RoleUpdateRequest, Statistics, UserStatistics,
};
use crate::{
    activity::RequestOrigin,
    auth::AuthUser,
    error::{ApiError, ApiResult, JsonBody},
    export::{ExportFile, ExportFormat, ExportTable},
    store::UserListFilter,
    AppState,
};
use axum::extract::{Path, Query, State};
use chrono::{Duration, Utc};
use ledger_core::{not_found_error, AuditLevel, LedgerError, PageRequest, Role, UserProfile};
use tracing::{info, warn};

const LOG_PAGE_SIZE: u32 = 20;
const LOG_PAGE_SIZE_MAX: u32 = 100;
const RECENT_DAYS: i64 = 7;

fn reject_self(admin: &AuthUser, target: i64, message: &str) -> ApiResult<()> {
    if admin.id == target {
        warn!(user_id = admin.id, "{}", message);
        return Err(ApiError(LedgerError::validation(message, "id", "admin")));
    }
    Ok(())
}

/// List users with their entry counts
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    summary = "List users",
    params(AdminUsersQuery),
    responses(
        (status = 200, description = "One page of users", body = AdminUserPage),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminUsersQuery>,
) -> ApiResult<ApiResponse<AdminUserPage>> {
    let pagination = &state.config.pagination;
    let page = PageRequest::resolve(
        query.page.as_deref(),
        query.page_size.as_deref(),
        pagination.admin_page_size,
        pagination.max_page_size,
    );
    let filter = UserListFilter {
        search: query.search.clone(),
        role: query.role.as_deref().and_then(|r| r.parse::<Role>().ok()),
    };

    let (users, total) = state.users.list(&filter, page).await?;
    Ok(ApiResponse::ok(AdminUserPage {
        users,
        total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages(total),
    }))
}

/// Change another user's role
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    tag = "Admin",
    summary = "Update user role",
    description = "Takes effect when the user's current token expires",
    params(("id" = i64, Path, description = "User ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = UserProfile),
        (status = 400, description = "Own account or invalid role"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    admin: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<RoleUpdateRequest>,
) -> ApiResult<ApiResponse<UserProfile>> {
    reject_self(&admin, id, "Cannot change your own role")?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError(not_found_error!("User", "admin")))?;

    let role = request
        .role
        .as_deref()
        .and_then(|r| r.parse::<Role>().ok())
        .ok_or_else(|| ApiError(LedgerError::validation("Invalid role", "role", "admin")))?;

    state.users.update_role(id, role).await?;
    info!(
        admin_id = admin.id,
        user_id = id,
        from = %user.role,
        to = %role,
        "User role changed"
    );
    state
        .activity
        .record(
            AuditLevel::Info,
            &format!(
                "User role changed: {} from {} to {}",
                user.username, user.role, role
            ),
            Some(admin.id),
            &origin,
        )
        .await;

    let mut profile = user.profile();
    profile.role = role;
    Ok(ApiResponse::with_message(
        "User role updated successfully",
        profile,
    ))
}

/// Delete another user with their entries
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    summary = "Delete user",
    description = "Removes the user's ledger entries and detaches their audit rows",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    reject_self(&admin, id, "Cannot delete your own account")?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError(not_found_error!("User", "admin")))?;

    let removed = state.users.delete_cascade(id).await?;
    state
        .activity
        .record_with_details(
            AuditLevel::Warning,
            &format!("User deleted: {}", user.username),
            Some(admin.id),
            Some(&format!("{} ledger entries removed", removed)),
            &origin,
        )
        .await;

    Ok(ApiResponse::message("User deleted successfully"))
}

/// User and entry totals
#[utoipa::path(
    get,
    path = "/api/admin/statistics",
    tag = "Admin",
    summary = "System statistics",
    responses((status = 200, description = "Totals", body = Statistics)),
    security(("bearer_auth" = []))
)]
pub async fn statistics(State(state): State<AppState>) -> ApiResult<ApiResponse<Statistics>> {
    let since = Utc::now() - Duration::days(RECENT_DAYS);

    let users = UserStatistics {
        total: state.users.count().await?,
        by_role: state.users.count_by_role().await?,
    };
    let entries = EntryStatistics {
        total: state.ledger.count().await?,
        recent_7_days: state.ledger.count_since(since).await?,
        by_province: state.ledger.count_by_province().await?.into_iter().collect(),
    };

    Ok(ApiResponse::ok(Statistics {
        users,
        entries,
        generated_at: Utc::now(),
    }))
}

/// Filtered activity log, newest first
#[utoipa::path(
    get,
    path = "/api/admin/logs",
    tag = "Admin",
    summary = "Activity log",
    params(AdminLogsQuery),
    responses((status = 200, description = "One page of audit rows", body = LogPage)),
    security(("bearer_auth" = []))
)]
pub async fn activity_logs(
    State(state): State<AppState>,
    Query(query): Query<AdminLogsQuery>,
) -> ApiResult<ApiResponse<LogPage>> {
    let page = PageRequest::resolve(
        query.page.as_deref(),
        query.limit.as_deref(),
        LOG_PAGE_SIZE,
        LOG_PAGE_SIZE_MAX,
    );

    let (logs, total) = state
        .activity
        .repository()
        .list(&query.filter(), page)
        .await?;
    Ok(ApiResponse::ok(LogPage {
        logs,
        total_logs: total,
        total_pages: page.total_pages(total),
        current_page: page.page,
        per_page: page.page_size,
    }))
}

/// Export the whole activity log
#[utoipa::path(
    get,
    path = "/api/admin/export/logs",
    tag = "Admin",
    summary = "Export activity log",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV, XLSX or DOCX attachment", content_type = "application/octet-stream")
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_logs(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<ExportFile> {
    let format = ExportFormat::parse(query.format.as_deref());
    let logs = state.activity.repository().all().await?;
    info!(
        admin_id = admin.id,
        rows = logs.len(),
        format = format.extension(),
        "Exporting activity log"
    );
    Ok(ExportFile::render(
        &ExportTable::activity(&logs),
        format,
        "logs_export",
    )?)
}
