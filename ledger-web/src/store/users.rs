//! Credential store

use crate::database::{is_unique_violation, storage_error, Database};
use chrono::{DateTime, Utc};
use ledger_core::{
    not_found_error, LedgerError, LedgerResult, PageRequest, Role, UserAccount, UserSummary,
};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_role(raw: &str) -> Role {
    raw.parse().unwrap_or_else(|_| {
        warn!(role = %raw, "Unknown role in database, treating as basic user");
        Role::User
    })
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        UserAccount {
            id: row.id,
            role: parse_role(&row.role),
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    username: String,
    role: String,
    created_at: DateTime<Utc>,
    entry_count: i64,
}

/// Filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserListFilter {
    /// Username substring
    pub search: Option<String>,
    pub role: Option<Role>,
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE
pub(crate) fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new identity. Duplicate usernames yield `Conflict`.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> LedgerResult<UserAccount> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::conflict("Username already exists", "users")
            } else {
                storage_error("create_user", e)
            }
        })?;

        Ok(UserAccount {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_username(&self, username: &str) -> LedgerResult<Option<UserAccount>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, role, created_at, updated_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| storage_error("find_user_by_username", e))?;
        Ok(row.map(Into::into))
    }

    pub async fn find_by_id(&self, id: i64) -> LedgerResult<Option<UserAccount>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, role, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| storage_error("find_user_by_id", e))?;
        Ok(row.map(Into::into))
    }

    pub async fn exists(&self, username: &str) -> LedgerResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("user_exists", e))?;
        Ok(count > 0)
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> LedgerResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(self.db.pool())
                .await
                .map_err(|e| storage_error("update_password", e))?;
        if result.rows_affected() == 0 {
            return Err(not_found_error!(format!("User {}", id), "users"));
        }
        Ok(())
    }

    pub async fn update_role(&self, id: i64, role: Role) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(|e| storage_error("update_role", e))?;
        if result.rows_affected() == 0 {
            return Err(not_found_error!(format!("User {}", id), "users"));
        }
        Ok(())
    }

    /// Delete a user together with their entries, detaching their audit rows.
    /// Runs in one transaction; any failure rolls everything back.
    /// Returns the number of ledger entries removed.
    pub async fn delete_cascade(&self, id: i64) -> LedgerResult<u64> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| storage_error("begin_delete_user", e))?;

        let entries = sqlx::query("DELETE FROM ledger_entries WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_user_entries", e))?
            .rows_affected();

        sqlx::query("UPDATE activity_logs SET user_id = NULL WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("detach_user_logs", e))?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_user", e))?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the statements above
            return Err(not_found_error!(format!("User {}", id), "users"));
        }

        tx.commit()
            .await
            .map_err(|e| storage_error("commit_delete_user", e))?;

        info!(user_id = id, entries_removed = entries, "User deleted");
        Ok(entries)
    }

    fn push_list_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &UserListFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            builder
                .push(" AND u.username LIKE ")
                .push_bind(like_pattern(search.trim()))
                .push(" ESCAPE '\\'");
        }
        if let Some(role) = filter.role {
            builder.push(" AND u.role = ").push_bind(role.as_str());
        }
    }

    /// Paginated listing with per-user entry counts, newest first
    pub async fn list(
        &self,
        filter: &UserListFilter,
        page: PageRequest,
    ) -> LedgerResult<(Vec<UserSummary>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users u");
        Self::push_list_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("count_users", e))?;

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT u.id, u.username, u.role, u.created_at,
                    (SELECT COUNT(*) FROM ledger_entries e WHERE e.user_id = u.id) AS entry_count
             FROM users u",
        );
        Self::push_list_filters(&mut query, filter);
        query
            .push(" ORDER BY u.created_at DESC, u.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<SummaryRow> = query
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("list_users", e))?;

        let users = rows
            .into_iter()
            .map(|row| UserSummary {
                id: row.id,
                role: parse_role(&row.role),
                username: row.username,
                created_at: row.created_at,
                entry_count: row.entry_count,
            })
            .collect();
        Ok((users, total))
    }

    pub async fn count(&self) -> LedgerResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("count_users", e))?;
        Ok(count)
    }

    /// Counts per role; every role is present, zero when unused
    pub async fn count_by_role(&self) -> LedgerResult<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(self.db.pool())
                .await
                .map_err(|e| storage_error("count_users_by_role", e))?;

        let mut counts: BTreeMap<String, i64> = Role::ALL
            .iter()
            .map(|r| (r.as_str().to_string(), 0))
            .collect();
        for (role, count) in rows {
            *counts.entry(role).or_insert(0) += count;
        }
        Ok(counts)
    }

    /// Create the bootstrap admin when no account with that name exists
    pub async fn ensure_admin(&self, username: &str, password_hash: &str) -> LedgerResult<bool> {
        if self.exists(username).await? {
            return Ok(false);
        }
        match self.create(username, password_hash, Role::Admin).await {
            Ok(_) => {
                warn!(
                    username = %username,
                    "Created bootstrap admin account, change its password after first login"
                );
                Ok(true)
            }
            // Another process created it between the check and the insert
            Err(LedgerError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
