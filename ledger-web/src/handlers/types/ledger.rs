//! Ledger, lookup and export request types

use ledger_core::{
    parse_date, validation_error, LedgerChanges, LedgerEntry, LedgerFilter, LedgerResult,
    NewLedgerEntry,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of create and update requests. Every field is optional on the wire;
/// create enforces the required ones.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LedgerEntryRequest {
    #[schema(example = "上海")]
    pub province: Option<String>,
    pub project_name: Option<String>,
    /// `YYYY-MM-DD`
    #[schema(example = "2024-03-01")]
    pub date: Option<String>,
    pub location: Option<String>,
    pub personnel: Option<String>,
    #[schema(example = "会议纪要")]
    pub nature: Option<String>,
    pub specific_matters: Option<String>,
    pub follow_up_points: Option<String>,
}

fn required(value: &Option<String>, field: &str) -> LedgerResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(validation_error!(
            format!("Missing required field: {}", field),
            field,
            "ledger"
        )),
    }
}

fn date_field(value: &str) -> LedgerResult<chrono::NaiveDate> {
    parse_date(value).ok_or_else(|| {
        validation_error!("Invalid date format, use YYYY-MM-DD", "date", "ledger")
    })
}

impl LedgerEntryRequest {
    pub fn into_new_entry(self) -> LedgerResult<NewLedgerEntry> {
        let date = required(&self.date, "date")?;
        Ok(NewLedgerEntry {
            province: required(&self.province, "province")?,
            project_name: required(&self.project_name, "project_name")?,
            date: date_field(&date)?,
            location: required(&self.location, "location")?,
            personnel: required(&self.personnel, "personnel")?,
            nature: required(&self.nature, "nature")?,
            specific_matters: required(&self.specific_matters, "specific_matters")?,
            follow_up_points: self
                .follow_up_points
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Provided fields overwrite; absent fields are left alone
    pub fn into_changes(self) -> LedgerResult<LedgerChanges> {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        let date = match self.date.as_deref() {
            Some(raw) => Some(date_field(raw)?),
            None => None,
        };
        Ok(LedgerChanges {
            province: trim(self.province),
            project_name: trim(self.project_name),
            date,
            location: trim(self.location),
            personnel: trim(self.personnel),
            nature: trim(self.nature),
            specific_matters: trim(self.specific_matters),
            follow_up_points: trim(self.follow_up_points),
        })
    }
}

/// Listing and export filters. Unparsable dates are ignored.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LedgerQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub project_name: Option<String>,
    pub location: Option<String>,
    /// Substring of the body, personnel or follow-up points
    pub keyword: Option<String>,
    pub province: Option<String>,
    pub nature: Option<String>,
    /// Owner username
    pub recorder: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Export only: csv, excel or word
    pub format: Option<String>,
}

impl LedgerQuery {
    pub fn filter(&self, owner_id: Option<i64>) -> LedgerFilter {
        LedgerFilter {
            project_name: self.project_name.clone(),
            location: self.location.clone(),
            keyword: self.keyword.clone(),
            province: self.province.clone(),
            nature: self.nature.clone(),
            recorder: self.recorder.clone(),
            start_date: self.start_date.as_deref().and_then(parse_date),
            end_date: self.end_date.as_deref().and_then(parse_date),
            owner_id,
        }
    }
}

/// Paginated ledger listing
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPage {
    pub items: Vec<LedgerEntry>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl From<ledger_core::Page<LedgerEntry>> for LedgerPage {
    fn from(page: ledger_core::Page<LedgerEntry>) -> Self {
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestionQuery {
    /// Text to complete
    pub query: Option<String>,
    pub province: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Look-back window in days, default 30
    pub days: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// csv (default), excel or word
    pub format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserCount {
    pub username: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthCount {
    #[schema(example = "2024-03")]
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserTrend {
    pub username: String,
    pub records: Vec<MonthCount>,
}

/// Per-user entry totals and monthly trend
#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerStatsByUser {
    pub days: i64,
    pub total: Vec<UserCount>,
    pub trend: Vec<UserTrend>,
}
