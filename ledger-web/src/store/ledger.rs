//! Ledger record store: CRUD, filtered search and aggregate queries

use super::users::like_pattern;
use crate::database::{storage_error, Database};
use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
    not_found_error, LedgerChanges, LedgerEntry, LedgerFilter, LedgerResult, NewLedgerEntry,
    PageRequest,
};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

const SELECT_ENTRY: &str = "SELECT e.id, e.user_id, u.username AS recorder, e.province, \
     e.project_name, e.date, e.location, e.personnel, e.nature, e.specific_matters, \
     e.follow_up_points, e.created_at, e.updated_at \
     FROM ledger_entries e LEFT JOIN users u ON u.id = e.user_id";

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    user_id: i64,
    recorder: Option<String>,
    province: String,
    project_name: String,
    date: NaiveDate,
    location: String,
    personnel: String,
    nature: String,
    specific_matters: String,
    follow_up_points: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EntryRow> for LedgerEntry {
    fn from(row: EntryRow) -> Self {
        LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            recorder: row.recorder,
            province: row.province,
            project_name: row.project_name,
            date: row.date,
            location: row.location,
            personnel: row.personnel,
            nature: row.nature,
            specific_matters: row.specific_matters,
            follow_up_points: row.follow_up_points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Per-user entry count
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserEntryCount {
    pub username: String,
    pub count: i64,
}

/// Per-user count for one `YYYY-MM` month
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyUserCount {
    pub username: String,
    pub month: String,
    pub count: i64,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Append the WHERE clause shared by listing, counting and export
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LedgerFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(owner) = filter.owner_id {
        builder.push(" AND e.user_id = ").push_bind(owner);
    }
    if let Some(project) = non_blank(&filter.project_name) {
        builder
            .push(" AND e.project_name LIKE ")
            .push_bind(like_pattern(project))
            .push(" ESCAPE '\\'");
    }
    if let Some(location) = non_blank(&filter.location) {
        builder
            .push(" AND e.location LIKE ")
            .push_bind(like_pattern(location))
            .push(" ESCAPE '\\'");
    }
    if let Some(keyword) = non_blank(&filter.keyword) {
        let pattern = like_pattern(keyword);
        builder
            .push(" AND (e.specific_matters LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.personnel LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.follow_up_points LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(province) = non_blank(&filter.province) {
        builder.push(" AND e.province = ").push_bind(province.to_string());
    }
    if let Some(nature) = non_blank(&filter.nature) {
        builder.push(" AND e.nature = ").push_bind(nature.to_string());
    }
    if let Some(recorder) = non_blank(&filter.recorder) {
        builder.push(" AND u.username = ").push_bind(recorder.to_string());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND e.date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND e.date <= ").push_bind(end);
    }
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: Database,
}

impl LedgerRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, owner_id: i64, entry: &NewLedgerEntry) -> LedgerResult<LedgerEntry> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO ledger_entries (user_id, province, project_name, date, location, \
             personnel, nature, specific_matters, follow_up_points, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(&entry.province)
        .bind(&entry.project_name)
        .bind(entry.date)
        .bind(&entry.location)
        .bind(&entry.personnel)
        .bind(&entry.nature)
        .bind(&entry.specific_matters)
        .bind(&entry.follow_up_points)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| storage_error("insert_entry", e))?;

        let id = result.last_insert_rowid();
        debug!(entry_id = id, owner_id, "Ledger entry inserted");
        self.get(id)
            .await?
            .ok_or_else(|| not_found_error!(format!("Entry {}", id), "ledger"))
    }

    pub async fn get(&self, id: i64) -> LedgerResult<Option<LedgerEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(&format!("{} WHERE e.id = ?", SELECT_ENTRY))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| storage_error("get_entry", e))?;
        Ok(row.map(Into::into))
    }

    /// Apply a partial update and return the refreshed row
    pub async fn update(&self, id: i64, changes: &LedgerChanges) -> LedgerResult<LedgerEntry> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE ledger_entries SET ");
        {
            let mut set = builder.separated(", ");
            let text_columns = [
                ("province", &changes.province),
                ("project_name", &changes.project_name),
                ("location", &changes.location),
                ("personnel", &changes.personnel),
                ("nature", &changes.nature),
                ("specific_matters", &changes.specific_matters),
                ("follow_up_points", &changes.follow_up_points),
            ];
            for (column, value) in text_columns {
                if let Some(value) = value {
                    set.push(format!("{} = ", column))
                        .push_bind_unseparated(value.clone());
                }
            }
            if let Some(date) = changes.date {
                set.push("date = ").push_bind_unseparated(date);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder
            .build()
            .execute(self.db.pool())
            .await
            .map_err(|e| storage_error("update_entry", e))?;
        if result.rows_affected() == 0 {
            return Err(not_found_error!(format!("Entry {}", id), "ledger"));
        }

        self.get(id)
            .await?
            .ok_or_else(|| not_found_error!(format!("Entry {}", id), "ledger"))
    }

    pub async fn delete(&self, id: i64) -> LedgerResult<()> {
        let result = sqlx::query("DELETE FROM ledger_entries WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .map_err(|e| storage_error("delete_entry", e))?;
        if result.rows_affected() == 0 {
            return Err(not_found_error!(format!("Entry {}", id), "ledger"));
        }
        Ok(())
    }

    /// One page of matching entries, newest first, plus the total match count
    pub async fn search(
        &self,
        filter: &LedgerFilter,
        page: PageRequest,
    ) -> LedgerResult<(Vec<LedgerEntry>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM ledger_entries e LEFT JOIN users u ON u.id = e.user_id",
        );
        push_filters(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("count_entries", e))?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY e.created_at DESC, e.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<EntryRow> = query
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("search_entries", e))?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Every matching entry, newest first. Used by export.
    pub async fn search_all(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
        push_filters(&mut query, filter);
        query.push(" ORDER BY e.created_at DESC, e.id DESC");

        let rows: Vec<EntryRow> = query
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("export_entries", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest entries whose project, location or body contains `text`
    pub async fn suggestion_candidates(
        &self,
        text: &str,
        owner_id: Option<i64>,
        province: Option<&str>,
        limit: u32,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let pattern = like_pattern(text);
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
        query
            .push(" WHERE (e.project_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.location LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.specific_matters LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
        if let Some(owner) = owner_id {
            query.push(" AND e.user_id = ").push_bind(owner);
        }
        if let Some(province) = province.map(str::trim).filter(|p| !p.is_empty()) {
            query.push(" AND e.province = ").push_bind(province.to_string());
        }
        query
            .push(" ORDER BY e.created_at DESC, e.id DESC LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<EntryRow> = query
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| storage_error("suggestion_candidates", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count(&self) -> LedgerResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| storage_error("count_entries", e))?;
        Ok(count)
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> LedgerResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ledger_entries WHERE created_at >= ?")
                .bind(since)
                .fetch_one(self.db.pool())
                .await
                .map_err(|e| storage_error("count_recent_entries", e))?;
        Ok(count)
    }

    /// Entry counts per province, largest first
    pub async fn count_by_province(&self) -> LedgerResult<Vec<(String, i64)>> {
        sqlx::query_as(
            "SELECT province, COUNT(*) AS count FROM ledger_entries \
             GROUP BY province ORDER BY count DESC, province ASC",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| storage_error("count_by_province", e))
    }

    pub async fn counts_by_user_since(
        &self,
        since: DateTime<Utc>,
    ) -> LedgerResult<Vec<UserEntryCount>> {
        sqlx::query_as(
            "SELECT u.username AS username, COUNT(e.id) AS count \
             FROM users u JOIN ledger_entries e ON e.user_id = u.id \
             WHERE e.created_at >= ? GROUP BY u.username ORDER BY count DESC, u.username ASC",
        )
        .bind(since)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| storage_error("counts_by_user", e))
    }

    pub async fn monthly_counts_by_user_since(
        &self,
        since: DateTime<Utc>,
    ) -> LedgerResult<Vec<MonthlyUserCount>> {
        sqlx::query_as(
            "SELECT u.username AS username, substr(e.created_at, 1, 7) AS month, \
             COUNT(e.id) AS count \
             FROM users u JOIN ledger_entries e ON e.user_id = u.id \
             WHERE e.created_at >= ? GROUP BY u.username, month ORDER BY month ASC, u.username ASC",
        )
        .bind(since)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| storage_error("monthly_counts_by_user", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UserRepository;
    use ledger_core::{DatabaseConfig, Role};

    async fn setup() -> (LedgerRepository, i64, i64) {
        let db = Database::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        let users = UserRepository::new(db.clone());
        let alice = users.create("alice", "h", Role::User).await.unwrap();
        let bob = users.create("bob", "h", Role::User).await.unwrap();
        (LedgerRepository::new(db), alice.id, bob.id)
    }

    fn entry(project: &str, province: &str, date: &str) -> NewLedgerEntry {
        NewLedgerEntry {
            province: province.to_string(),
            project_name: project.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            location: "会议室".to_string(),
            personnel: "张三".to_string(),
            nature: "会议纪要".to_string(),
            specific_matters: "讨论进度。确认分工".to_string(),
            follow_up_points: None,
        }
    }

    #[tokio::test]
    async fn insert_returns_recorder() {
        let (repo, alice, _) = setup().await;
        let created = repo.insert(alice, &entry("Alpha", "上海", "2024-03-01")).await.unwrap();
        assert_eq!(created.recorder.as_deref(), Some("alice"));
        assert_eq!(created.date.to_string(), "2024-03-01");
    }

    #[tokio::test]
    async fn filters_combine() {
        let (repo, alice, bob) = setup().await;
        repo.insert(alice, &entry("Alpha 100%", "上海", "2024-03-01")).await.unwrap();
        repo.insert(alice, &entry("Beta", "江苏", "2024-03-05")).await.unwrap();
        repo.insert(bob, &entry("alpha two", "上海", "2024-04-01")).await.unwrap();

        let page = PageRequest { page: 1, page_size: 10 };

        let filter = LedgerFilter {
            project_name: Some("ALPHA".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.search(&filter, page).await.unwrap().1, 2);

        let filter = LedgerFilter {
            project_name: Some("100%".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.search(&filter, page).await.unwrap().1, 1);

        let filter = LedgerFilter {
            province: Some("上海".to_string()),
            recorder: Some("bob".to_string()),
            ..Default::default()
        };
        let (items, total) = repo.search(&filter, page).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].project_name, "alpha two");

        let filter = LedgerFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 2),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..Default::default()
        };
        assert_eq!(repo.search(&filter, page).await.unwrap().1, 2);

        let filter = LedgerFilter {
            owner_id: Some(alice),
            keyword: Some("分工".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.search(&filter, page).await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (repo, alice, _) = setup().await;
        let created = repo.insert(alice, &entry("Alpha", "上海", "2024-03-01")).await.unwrap();

        let changes = LedgerChanges {
            location: Some("现场".to_string()),
            ..Default::default()
        };
        let updated = repo.update(created.id, &changes).await.unwrap();
        assert_eq!(updated.location, "现场");
        assert_eq!(updated.project_name, "Alpha");
        assert!(updated.updated_at >= created.updated_at);

        let missing = repo.update(9999, &changes).await.unwrap_err();
        assert!(matches!(missing, ledger_core::LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn statistics_group_by_province_and_user() {
        let (repo, alice, bob) = setup().await;
        repo.insert(alice, &entry("A", "上海", "2024-03-01")).await.unwrap();
        repo.insert(alice, &entry("B", "上海", "2024-03-01")).await.unwrap();
        repo.insert(bob, &entry("C", "浙江", "2024-03-01")).await.unwrap();

        let by_province = repo.count_by_province().await.unwrap();
        assert_eq!(by_province[0], ("上海".to_string(), 2));

        let since = Utc::now() - chrono::Duration::days(30);
        let per_user = repo.counts_by_user_since(since).await.unwrap();
        assert_eq!(per_user[0].username, "alice");
        assert_eq!(per_user[0].count, 2);

        let monthly = repo.monthly_counts_by_user_since(since).await.unwrap();
        let month = Utc::now().format("%Y-%m").to_string();
        assert!(monthly.iter().all(|m| m.month == month));
        assert_eq!(repo.count_since(since).await.unwrap(), 3);
    }
}
