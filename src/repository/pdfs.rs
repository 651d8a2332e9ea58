//! Repository for archived PDF documents (`pdf_files` table).

use std::path::PathBuf;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{split_tags, NewPdfRow, PdfRecord};
use super::parse_datetime;
use super::pool::{DbError, SqlitePool};
use crate::models::PdfEntry;
use crate::schema::pdf_files;

impl From<PdfRecord> for PdfEntry {
    fn from(record: PdfRecord) -> Self {
        PdfEntry {
            pdf_id: record.pdf_id,
            title: record.title,
            company: record.company,
            tags: split_tags(&record.tags),
            year: record.year,
            url: record.url,
            file_path: PathBuf::from(record.file_path),
            file_size: record.file_size,
            file_type: record.file_type,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// Diesel-based repository over saved PDFs.
#[derive(Clone)]
pub struct PdfRepository {
    pool: SqlitePool,
}

impl PdfRepository {
    /// Create a new PDF repository with an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a PDF entry by document URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<PdfEntry>, DbError> {
        let mut conn = self.pool.get().await?;

        pdf_files::table
            .filter(pdf_files::url.eq(url))
            .first::<PdfRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(PdfEntry::from))
    }

    /// Save a PDF entry (insert or overwrite by primary key).
    pub async fn save(&self, entry: &PdfEntry) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let tags = entry.tags.join(", ");
        let file_path = entry.file_path.display().to_string();
        let created_at = entry.created_at.to_rfc3339();

        diesel::replace_into(pdf_files::table)
            .values(&NewPdfRow {
                pdf_id: &entry.pdf_id,
                title: &entry.title,
                company: &entry.company,
                tags: &tags,
                year: &entry.year,
                url: &entry.url,
                file_path: &file_path,
                file_size: entry.file_size,
                file_type: &entry.file_type,
                created_at: &created_at,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Count saved PDFs.
    pub async fn count(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        pdf_files::table.select(count_star()).first(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use diesel_async::SimpleAsyncConnection;
    use tempfile::tempdir;

    async fn setup_test_db() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let pool = SqlitePool::from_path(&db_path);

        let mut conn = pool.get().await.unwrap();
        conn.batch_execute(
            r#"CREATE TABLE IF NOT EXISTS pdf_files (
                pdf_id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                file_size BIGINT NOT NULL DEFAULT 0,
                file_type TEXT NOT NULL DEFAULT 'pdf',
                created_at TEXT NOT NULL
            )"#,
        )
        .await
        .unwrap();

        (pool, dir)
    }

    #[tokio::test]
    async fn test_save_and_get_by_url() {
        let (pool, _dir) = setup_test_db().await;
        let repo = PdfRepository::new(pool);

        let entry = PdfEntry {
            pdf_id: "ffee00112233".to_string(),
            title: "Paper".to_string(),
            company: "Lab".to_string(),
            tags: vec!["ml".to_string()],
            year: "2017".to_string(),
            url: "https://arxiv.org/pdf/1706.03762".to_string(),
            file_path: PathBuf::from("/s/pdfs/ffee00112233_Paper.pdf"),
            file_size: 2_184_404,
            file_type: "pdf".to_string(),
            created_at: Utc::now(),
        };
        repo.save(&entry).await.unwrap();

        let fetched = repo
            .get_by_url("https://arxiv.org/pdf/1706.03762")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.pdf_id, "ffee00112233");
        assert_eq!(fetched.file_size, 2_184_404);
        assert_eq!(fetched.file_type, "pdf");
        assert_eq!(repo.count().await.unwrap(), 1);

        // Upsert keeps one row
        repo.save(&entry).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
