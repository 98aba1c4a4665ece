//! SQLite connection management and schema bootstrap

use ledger_core::{DatabaseConfig, ErrorContext, LedgerError, LedgerResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Identifiers are AUTOINCREMENT so a deleted user's id is never handed to a
/// new account while old tokens carrying it are still valid.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        province TEXT NOT NULL,
        project_name TEXT NOT NULL,
        date TEXT NOT NULL,
        location TEXT NOT NULL,
        personnel TEXT NOT NULL,
        nature TEXT NOT NULL,
        specific_matters TEXT NOT NULL,
        follow_up_points TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        user_id INTEGER REFERENCES users(id),
        details TEXT,
        ip_address TEXT,
        user_agent TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS provinces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL,
        code TEXT UNIQUE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger_entries(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_created ON ledger_entries(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_province ON ledger_entries(province)",
    "CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_logs(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_activity_user ON activity_logs(user_id)",
];

/// Map a sqlx failure into the core error type
pub(crate) fn storage_error(operation: &str, error: sqlx::Error) -> LedgerError {
    LedgerError::Storage {
        message: format!("Database operation '{}' failed", operation),
        source: Some(Box::new(error)),
        context: ErrorContext::new("database").with_operation(operation),
    }
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Shared handle to the connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and create the schema
    pub async fn connect(config: &DatabaseConfig) -> LedgerResult<Self> {
        let url = config.url.as_str();
        info!(url = %url, "Connecting to database");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| storage_error("parse_url", e))?
            .foreign_keys(true);

        let pool = if is_memory_url(url) {
            // Every connection to `:memory:` is a separate database, so keep
            // exactly one alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(url);
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    info!("Creating database directory: {}", parent.display());
                    std::fs::create_dir_all(parent)?;
                }
            }

            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .connect_with(options.create_if_missing(true))
                .await
        }
        .map_err(|e| storage_error("connect", e))?;

        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> LedgerResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("migrate", e))?;
        }
        debug!("Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap liveness probe
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = Database::connect(&memory_config()).await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.ping().await);

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for table in ["activity_logs", "ledger_entries", "provinces", "users"] {
            assert!(names.contains(&table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn file_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };

        let db = Database::connect(&config).await.unwrap();
        assert!(db.ping().await);
        assert!(path.exists());
    }
}
