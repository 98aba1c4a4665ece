//! Append-only audit rows

use crate::database::{storage_error, Database};
use chrono::{DateTime, Utc};
use ledger_core::{ActivityFilter, AuditEntry, AuditLevel, LedgerResult, PageRequest};
use sqlx::{QueryBuilder, Sqlite};
use tracing::warn;

const SELECT_LOG: &str = "SELECT l.id, l.timestamp, l.level, l.message, l.user_id, \
     u.username AS username, l.details, l.ip_address, l.user_agent \
     FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id";

/// Maximum stored length of a user agent string
pub const USER_AGENT_MAX_CHARS: usize = 500;

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    timestamp: DateTime<Utc>,
    level: String,
    message: String,
    user_id: Option<i64>,
    username: Option<String>,
    details: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl From<LogRow> for AuditEntry {
    fn from(row: LogRow) -> Self {
        let level = row.level.parse().unwrap_or_else(|_| {
            warn!(level = %row.level, "Unknown audit level in database");
            AuditLevel::Info
        });
        AuditEntry {
            id: row.id,
            timestamp: row.timestamp,
            level,
            message: row.message,
            user_id: row.user_id,
            username: row.username,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        }
    }
}

/// Row to append
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub level: AuditLevel,
    pub message: &'a str,
    pub user_id: Option<i64>,
    pub details: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ActivityFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(level) = filter.level {
        builder.push(" AND l.level = ").push_bind(level.as_str());
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND l.user_id = ").push_bind(user_id);
    }
    if let Some(start) = filter.start {
        builder.push(" AND l.timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        builder.push(" AND l.timestamp <= ").push_bind(end);
    }
}

#[derive(Debug, Clone)]
pub struct ActivityLogRepository {
    db: Database,
}

impl ActivityLogRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, entry: &NewAuditEntry<'_>) -> LedgerResult<i64> {
        let user_agent = entry
            .user_agent
            .map(|ua| ua.chars().take(USER_AGENT_MAX_CHARS).collect::<String>());

        let result = sqlx::query(
            "INSERT INTO activity_logs \
             (timestamp, level, message, user_id, details, ip_address, user_agent) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Utc::now())
        .bind(entry.level.as_str())
        .bind(entry.message)
        .bind(entry.user_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(user_agent)
        .execute(self.db.pool())
        .await
        .map_err(|e| storage_error("insert_activity_log", e))?;
        Ok(result.last_insert_rowid())
    }

    /// One page of audit rows, newest first, plus the total match count
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> LedgerResult<(Vec<AuditEntry>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM activity_logs l");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("count_activity_logs", e))?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_LOG);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY l.timestamp DESC, l.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<LogRow> = query
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("list_activity_logs", e))?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Every audit row, newest first
    pub async fn all(&self) -> LedgerResult<Vec<AuditEntry>> {
        let rows: Vec<LogRow> =
            sqlx::query_as(&format!("{} ORDER BY l.timestamp DESC, l.id DESC", SELECT_LOG))
                .fetch_all(self.db.pool())
                .await
                .map_err(|e| storage_error("export_activity_logs", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
