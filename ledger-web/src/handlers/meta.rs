//! Lookup lists, autocomplete, ledger export and reporting

use super::types::{
    ApiResponse, LedgerQuery, LedgerStatsByUser, MonthCount, StatsQuery,
    SuggestionQuery, UserCount, UserTrend,
};
use crate::{
    auth::AuthUser,
    error::ApiResult,
    export::{ExportFile, ExportFormat, ExportTable},
    suggestions::{rank_suggestions, SuggestionSource},
    AppState,
};
use axum::extract::{Query, State};
use chrono::{Duration, Utc};
use ledger_core::Suggestion;
use tracing::{debug, info};

const DEFAULT_STATS_DAYS: i64 = 30;
const MAX_STATS_DAYS: i64 = 3650;

/// Province names, ordered by name
#[utoipa::path(
    get,
    path = "/api/meta/provinces",
    tag = "Meta",
    summary = "List provinces",
    responses((status = 200, description = "Province names", body = [String])),
    security(("bearer_auth" = []))
)]
pub async fn provinces(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<String>>> {
    let mut names = state.provinces.list_names().await?;
    if names.is_empty() {
        let seeded = state.provinces.seed(&state.config.catalog.provinces).await?;
        info!(seeded, "Province table was empty, re-seeded defaults");
        names = state.provinces.list_names().await?;
    }
    Ok(ApiResponse::ok(names))
}

/// Configured entry categories
#[utoipa::path(
    get,
    path = "/api/meta/nature-options",
    tag = "Meta",
    summary = "List entry categories",
    responses((status = 200, description = "Category names", body = [String])),
    security(("bearer_auth" = []))
)]
pub async fn nature_options(State(state): State<AppState>) -> ApiResponse<Vec<String>> {
    ApiResponse::ok(state.config.catalog.nature_options.clone())
}

async fn suggest(
    state: &AppState,
    user: &AuthUser,
    query: &SuggestionQuery,
    source: SuggestionSource,
) -> ApiResult<Vec<Suggestion>> {
    let text = query.query.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let pagination = &state.config.pagination;
    let candidates = state
        .ledger
        .suggestion_candidates(
            text,
            user.owner_scope(),
            query.province.as_deref(),
            pagination.suggestion_candidates,
        )
        .await?;
    debug!(candidates = candidates.len(), ?source, "Ranking suggestions");
    Ok(rank_suggestions(
        &candidates,
        text,
        source,
        pagination.suggestion_limit,
    ))
}

/// Autocomplete over project names, locations and entry sentences
#[utoipa::path(
    get,
    path = "/api/meta/suggestions/project_items",
    tag = "Meta",
    summary = "Suggest project items",
    params(SuggestionQuery),
    responses((status = 200, description = "Ranked suggestions", body = [Suggestion])),
    security(("bearer_auth" = []))
)]
pub async fn project_item_suggestions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SuggestionQuery>,
) -> ApiResult<ApiResponse<Vec<Suggestion>>> {
    let suggestions = suggest(&state, &user, &query, SuggestionSource::ProjectItems).await?;
    Ok(ApiResponse::ok(suggestions))
}

/// Autocomplete over locations only
#[utoipa::path(
    get,
    path = "/api/meta/suggestions/locations",
    tag = "Meta",
    summary = "Suggest locations",
    params(SuggestionQuery),
    responses((status = 200, description = "Ranked suggestions", body = [Suggestion])),
    security(("bearer_auth" = []))
)]
pub async fn location_suggestions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SuggestionQuery>,
) -> ApiResult<ApiResponse<Vec<Suggestion>>> {
    let suggestions = suggest(&state, &user, &query, SuggestionSource::Locations).await?;
    Ok(ApiResponse::ok(suggestions))
}

/// Export the filtered ledger as a file
#[utoipa::path(
    get,
    path = "/api/meta/export/ledger",
    tag = "Meta",
    summary = "Export ledger entries",
    description = "Accepts the listing filters. Basic users only export their own entries.",
    params(LedgerQuery),
    responses(
        (status = 200, description = "CSV, XLSX or DOCX attachment", content_type = "application/octet-stream")
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_ledger(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<ExportFile> {
    let format = ExportFormat::parse(query.format.as_deref());
    let entries = state
        .ledger
        .search_all(&query.filter(user.owner_scope()))
        .await?;
    info!(
        user_id = user.id,
        rows = entries.len(),
        format = format.extension(),
        "Exporting ledger"
    );
    Ok(ExportFile::render(
        &ExportTable::ledger(&entries),
        format,
        "ledger_export",
    )?)
}

/// Per-user entry totals and monthly trend over a look-back window
#[utoipa::path(
    get,
    path = "/api/meta/stats/ledger_by_user",
    tag = "Meta",
    summary = "Entries per user",
    params(StatsQuery),
    responses((status = 200, description = "Totals and monthly trend", body = LedgerStatsByUser)),
    security(("bearer_auth" = []))
)]
pub async fn ledger_stats_by_user(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<ApiResponse<LedgerStatsByUser>> {
    let days = query
        .days
        .as_deref()
        .and_then(|d| d.trim().parse::<i64>().ok())
        .filter(|d| *d > 0)
        .map(|d| d.min(MAX_STATS_DAYS))
        .unwrap_or(DEFAULT_STATS_DAYS);
    let since = Utc::now() - Duration::days(days);

    let total = state
        .ledger
        .counts_by_user_since(since)
        .await?
        .into_iter()
        .map(|row| UserCount {
            username: row.username,
            count: row.count,
        })
        .collect();

    // Rows arrive ordered by month; group them per user keeping first-seen order
    let mut trend: Vec<UserTrend> = Vec::new();
    for row in state.ledger.monthly_counts_by_user_since(since).await? {
        let record = MonthCount {
            month: row.month,
            count: row.count,
        };
        match trend.iter_mut().find(|t| t.username == row.username) {
            Some(existing) => existing.records.push(record),
            None => trend.push(UserTrend {
                username: row.username,
                records: vec![record],
            }),
        }
    }

    Ok(ApiResponse::ok(LedgerStatsByUser { days, total, trend }))
}
