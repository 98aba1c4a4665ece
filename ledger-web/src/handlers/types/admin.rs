//! Admin request and response types

use chrono::{DateTime, NaiveTime, Utc};
use ledger_core::{parse_date, ActivityFilter, AuditEntry, UserSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminUsersQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    /// Username substring
    pub search: Option<String>,
    /// user, power_user or admin
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserPage {
    pub users: Vec<UserSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    #[schema(example = "power_user")]
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminLogsQuery {
    pub page: Option<String>,
    /// Page size, default 20, at most 100
    pub limit: Option<String>,
    /// INFO, WARNING or ERROR; anything else is ignored
    pub level: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    /// Inclusive through 23:59:59
    pub end_date: Option<String>,
}

impl AdminLogsQuery {
    pub fn filter(&self) -> ActivityFilter {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        ActivityFilter {
            level: self.level.as_deref().and_then(|l| l.parse().ok()),
            user_id: self.user_id.as_deref().and_then(|u| u.trim().parse().ok()),
            start: self
                .start_date
                .as_deref()
                .and_then(parse_date)
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            end: self
                .end_date
                .as_deref()
                .and_then(parse_date)
                .map(|d| d.and_time(end_of_day).and_utc()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogPage {
    pub logs: Vec<AuditEntry>,
    pub total_logs: i64,
    pub total_pages: i64,
    pub current_page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatistics {
    pub total: i64,
    pub by_role: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntryStatistics {
    pub total: i64,
    pub recent_7_days: i64,
    pub by_province: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Statistics {
    pub users: UserStatistics,
    pub entries: EntryStatistics,
    pub generated_at: DateTime<Utc>,
}
