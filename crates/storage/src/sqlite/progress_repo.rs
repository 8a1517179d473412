use course_core::model::{LessonId, LessonProgress};
use sqlx::SqliteConnection;
use tracing::warn;

use super::SqliteRepository;
use super::mapping::{PROGRESS_COLUMNS, datetime_to_millis, map_progress_row, slug_from_row};
use super::migrate::current_version;
use crate::repository::{ProgressScan, ProgressStore, RejectedRecord, StorageError};

fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

async fn upsert(conn: &mut SqliteConnection, progress: &LessonProgress) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO lesson_progress (
            slug, status, quiz_passed, viewed_at, completed_at, last_accessed_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(slug) DO UPDATE SET
            status = excluded.status,
            quiz_passed = excluded.quiz_passed,
            viewed_at = excluded.viewed_at,
            completed_at = excluded.completed_at,
            last_accessed_at = excluded.last_accessed_at
        ",
    )
    .bind(progress.lesson_id().as_str())
    .bind(progress.status().as_str())
    .bind(i64::from(progress.is_quiz_passed()))
    .bind(progress.viewed_at().map(datetime_to_millis))
    .bind(progress.completed_at().map(datetime_to_millis))
    .bind(datetime_to_millis(progress.last_accessed_at()))
    .execute(conn)
    .await
    .map_err(conn_err)?;

    Ok(())
}

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn get(&self, id: &LessonId) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE slug = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn put(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(conn_err)?;
        upsert(&mut *conn, progress).await
    }

    async fn scan(&self) -> Result<ProgressScan, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress ORDER BY slug ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut scan = ProgressScan::default();
        for row in &rows {
            match map_progress_row(row) {
                Ok(progress) => scan.records.push(progress),
                Err(err) => {
                    let slug = slug_from_row(row).unwrap_or_default();
                    warn!(slug = %slug, error = %err, "skipping unreadable progress row");
                    scan.rejected.push(RejectedRecord {
                        slug,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(scan)
    }

    async fn replace_all(&self, records: &[LessonProgress]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn_err)?;
        for record in records {
            upsert(&mut *tx, record).await?;
        }
        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM lesson_progress")
            .execute(&self.pool)
            .await
            .map_err(conn_err)?;
        Ok(())
    }

    async fn schema_version(&self) -> Result<u32, StorageError> {
        current_version(&self.pool).await.map_err(conn_err)
    }
}
