//! Core data type definitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Date format used on the wire for ledger dates and date filters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date, returning `None` for anything else
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Access tier of an identity, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Basic tier: may only modify own entries
    #[default]
    #[serde(alias = "basic")]
    User,
    /// Elevated tier: bypasses ownership checks
    #[serde(alias = "elevated")]
    PowerUser,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::PowerUser, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::PowerUser => "power_user",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may act on entries owned by someone else
    pub fn bypasses_ownership(&self) -> bool {
        !matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" | "basic" => Ok(Role::User),
            "power_user" | "elevated" => Ok(Role::PowerUser),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Severity of an audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(AuditLevel::Info),
            "WARNING" => Ok(AuditLevel::Warning),
            "ERROR" => Ok(AuditLevel::Error),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// Stored identity, including the password hash. Never serialized to clients.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Public view of an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Admin listing row: a profile plus how many entries the user owns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub entry_count: i64,
}

/// A single work-log record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    /// Owner's username
    pub recorder: Option<String>,
    pub province: String,
    pub project_name: String,
    pub date: NaiveDate,
    pub location: String,
    pub personnel: String,
    pub nature: String,
    pub specific_matters: String,
    pub follow_up_points: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new entry
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub province: String,
    pub project_name: String,
    pub date: NaiveDate,
    pub location: String,
    pub personnel: String,
    pub nature: String,
    pub specific_matters: String,
    pub follow_up_points: Option<String>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct LedgerChanges {
    pub province: Option<String>,
    pub project_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub personnel: Option<String>,
    pub nature: Option<String>,
    pub specific_matters: Option<String>,
    pub follow_up_points: Option<String>,
}

/// Search filters for ledger listings and exports. All fields are AND-ed.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub project_name: Option<String>,
    pub location: Option<String>,
    /// Matches specific_matters, personnel and follow_up_points
    pub keyword: Option<String>,
    pub province: Option<String>,
    pub nature: Option<String>,
    /// Owner username
    pub recorder: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Restricts results to one owner (basic-tier callers)
    pub owner_id: Option<i64>,
}

/// Resolved pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Resolve raw query values. Unparsable or non-positive values fall back
    /// to page 1 / `default_size`; sizes above `max_size` are clamped.
    pub fn resolve(
        page: Option<&str>,
        page_size: Option<&str>,
        default_size: u32,
        max_size: u32,
    ) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1);

        let page_size = page_size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|s| *s >= 1)
            .map(|s| s.min(max_size as i64) as u32)
            .unwrap_or(default_size)
            .min(max_size);

        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 || self.page_size == 0 {
            0
        } else {
            (total + self.page_size as i64 - 1) / self.page_size as i64
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: request.total_pages(total),
        }
    }
}

/// A persisted audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub message: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
}

/// Filters for the admin activity log listing
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub level: Option<AuditLevel>,
    pub user_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

/// Autocomplete hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Suggestion {
    pub value: String,
    pub count: u32,
}
