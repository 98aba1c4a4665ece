use crate::database::{storage_error, Database};
use ledger_core::LedgerResult;
use tracing::info;

/// Province lookup table
#[derive(Debug, Clone)]
pub struct ProvinceRepository {
    db: Database,
}

impl ProvinceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list_names(&self) -> LedgerResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM provinces ORDER BY name")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("list_provinces", e))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Insert any of `names` that are missing. Returns how many were added.
    pub async fn seed(&self, names: &[String]) -> LedgerResult<u64> {
        let mut added = 0;
        for name in names {
            added += sqlx::query("INSERT OR IGNORE INTO provinces (name) VALUES (?)")
                .bind(name)
                .execute(self.db.pool())
                .await
                .map_err(|e| storage_error("seed_provinces", e))?
                .rows_affected();
        }
        if added > 0 {
            info!(added, "Seeded province lookup table");
        }
        Ok(added)
    }
}
