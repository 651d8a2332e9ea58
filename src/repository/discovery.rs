//! Repository for raw discovery rows (`data` table).
//!
//! Rows land here straight from the index-page scrape; the harvest service
//! reads them back as work items. Inserts are keyed by URL so repeated
//! discovery runs never duplicate rows.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{split_tags, DiscoveredRowRecord, NewDiscoveredRow};
use super::pool::{DbError, SqlitePool};
use crate::models::ArticleRequest;
use crate::schema::data;

impl From<DiscoveredRowRecord> for ArticleRequest {
    fn from(record: DiscoveredRowRecord) -> Self {
        ArticleRequest {
            url: record.url,
            title: record.title,
            company: record.company,
            tags: split_tags(&record.tags),
            year: record.year,
        }
    }
}

/// Diesel-based repository over discovered index rows.
#[derive(Clone)]
pub struct DiscoveryRepository {
    pool: SqlitePool,
}

impl DiscoveryRepository {
    /// Create a new discovery repository with an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a discovered row, ignoring duplicates by URL.
    ///
    /// Returns true when the row was new.
    pub async fn insert(&self, request: &ArticleRequest) -> Result<bool, DbError> {
        let mut conn = self.pool.get().await?;
        let tags = request.tags_joined();

        let rows = diesel::insert_or_ignore_into(data::table)
            .values(&NewDiscoveredRow {
                company: &request.company,
                title: &request.title,
                tags: &tags,
                year: &request.year,
                url: &request.url,
            })
            .execute(&mut conn)
            .await?;

        Ok(rows > 0)
    }

    /// Get all discovered rows in insertion order.
    pub async fn all(&self) -> Result<Vec<ArticleRequest>, DbError> {
        let mut conn = self.pool.get().await?;

        data::table
            .order(data::id.asc())
            .load::<DiscoveredRowRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(ArticleRequest::from).collect())
    }

    /// Count discovered rows.
    pub async fn count(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        data::table.select(count_star()).first(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_async::SimpleAsyncConnection;
    use tempfile::tempdir;

    async fn setup_test_db() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let pool = SqlitePool::from_path(&db_path);

        let mut conn = pool.get().await.unwrap();
        conn.batch_execute(
            r#"CREATE TABLE IF NOT EXISTS data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL,
                title TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE
            )"#,
        )
        .await
        .unwrap();

        (pool, dir)
    }

    fn request(url: &str) -> ArticleRequest {
        ArticleRequest::new(
            url.to_string(),
            "A Post".to_string(),
            "Example".to_string(),
            vec!["infra".to_string()],
            "2024".to_string(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DiscoveryRepository::new(pool);

        assert!(repo.insert(&request("https://example.com/a")).await.unwrap());
        assert!(repo.insert(&request("https://example.com/b")).await.unwrap());

        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].url, "https://example.com/a");
        assert_eq!(all[0].tags, vec!["infra"]);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_ignores_duplicate_url() {
        let (pool, _dir) = setup_test_db().await;
        let repo = DiscoveryRepository::new(pool);

        assert!(repo.insert(&request("https://example.com/a")).await.unwrap());
        assert!(!repo.insert(&request("https://example.com/a")).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
