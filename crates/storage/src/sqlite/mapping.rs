use chrono::{DateTime, Utc};
use course_core::model::{LessonId, LessonProgress, LessonStatus};
use course_core::time::from_epoch_millis;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) const PROGRESS_COLUMNS: &str =
    "slug, status, quiz_passed, viewed_at, completed_at, last_accessed_at";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn millis_to_datetime(field: &'static str, v: i64) -> Result<DateTime<Utc>, StorageError> {
    from_epoch_millis(v)
        .ok_or_else(|| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn datetime_to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn slug_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<String, StorageError> {
    row.try_get::<String, _>("slug").map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonProgress, StorageError> {
    let slug = slug_from_row(row)?;

    let status_str: String = row.try_get("status").map_err(ser)?;
    let status = LessonStatus::parse(&status_str).map_err(ser)?;

    let quiz_passed = row.try_get::<i64, _>("quiz_passed").map_err(ser)? != 0;

    let viewed_at = row
        .try_get::<Option<i64>, _>("viewed_at")
        .map_err(ser)?
        .map(|v| millis_to_datetime("viewed_at", v))
        .transpose()?;
    let completed_at = row
        .try_get::<Option<i64>, _>("completed_at")
        .map_err(ser)?
        .map(|v| millis_to_datetime("completed_at", v))
        .transpose()?;
    let last_accessed_at = row
        .try_get::<Option<i64>, _>("last_accessed_at")
        .map_err(ser)?
        .ok_or_else(|| StorageError::Serialization("missing last_accessed_at".into()))
        .and_then(|v| millis_to_datetime("last_accessed_at", v))?;

    LessonProgress::from_persisted(
        LessonId::new(slug),
        status,
        quiz_passed,
        viewed_at,
        completed_at,
        last_accessed_at,
    )
    .map_err(ser)
}
