use chrono::Duration;
use course_core::model::{LessonId, LessonProgress, LessonStatus, ProgressEvent, SCHEMA_VERSION};
use course_core::time::fixed_now;
use storage::repository::{ProgressStore, Storage};
use storage::sqlite::{SqliteInitError, SqliteRepository};

async fn fresh_repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!(
        "sqlite:file:{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn record(slug: &str, event: ProgressEvent) -> LessonProgress {
    LessonProgress::apply(None, &LessonId::new(slug), event, fixed_now())
}

#[tokio::test]
async fn sqlite_roundtrip_persists_every_field() {
    let repo = fresh_repo("memdb_roundtrip").await;

    let viewed = record("returns", ProgressEvent::Viewed);
    let passed = LessonProgress::apply(
        Some(viewed),
        &LessonId::new("returns"),
        ProgressEvent::QuizPassed,
        fixed_now() + Duration::minutes(10),
    );
    repo.put(&passed).await.unwrap();

    let fetched = repo
        .get(&LessonId::new("returns"))
        .await
        .unwrap()
        .expect("record present");
    assert_eq!(fetched, passed);
    assert_eq!(fetched.status(), LessonStatus::Completed);
    assert!(fetched.is_quiz_passed());
    assert_eq!(fetched.viewed_at(), Some(fixed_now()));

    assert_eq!(repo.get(&LessonId::new("missing")).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_put_overwrites_existing_row() {
    let repo = fresh_repo("memdb_overwrite").await;

    repo.put(&record("a", ProgressEvent::Viewed)).await.unwrap();
    let completed = record("a", ProgressEvent::Completed);
    repo.put(&completed).await.unwrap();

    let scan = repo.scan().await.unwrap();
    assert_eq!(scan.records, vec![completed]);
}

#[tokio::test]
async fn sqlite_replace_all_and_clear() {
    let repo = fresh_repo("memdb_replace_all").await;

    let batch = vec![
        record("b", ProgressEvent::Viewed),
        record("a", ProgressEvent::Completed),
    ];
    repo.replace_all(&batch).await.unwrap();

    let scan = repo.scan().await.unwrap();
    let slugs: Vec<&str> = scan.records.iter().map(|r| r.lesson_id().as_str()).collect();
    assert_eq!(slugs, ["a", "b"]);

    repo.clear().await.unwrap();
    assert!(repo.scan().await.unwrap().records.is_empty());
}

#[tokio::test]
async fn fresh_database_is_at_current_schema_version() {
    let repo = fresh_repo("memdb_version").await;
    assert_eq!(repo.schema_version().await.unwrap(), SCHEMA_VERSION);

    // Migrating again is a no-op.
    repo.migrate().await.unwrap();
    assert_eq!(repo.schema_version().await.unwrap(), SCHEMA_VERSION);
}

#[tokio::test]
async fn upgrade_from_version_one_fills_new_fields_and_rejects_only_bad_rows() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_upgrade?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate_to(1).await.expect("v1 schema");
    assert_eq!(repo.schema_version().await.unwrap(), 1);

    let viewed_ms = fixed_now().timestamp_millis();
    let completed_ms = viewed_ms + 60_000;
    let rows: [(&str, &str, Option<i64>, Option<i64>); 4] = [
        ("viewed-only", "in_progress", Some(viewed_ms), None),
        ("finished", "completed", Some(viewed_ms), Some(completed_ms)),
        ("no-timestamps", "in_progress", None, None),
        ("legacy-status", "viewed", Some(viewed_ms), None),
    ];
    for (slug, status, viewed, completed) in rows {
        sqlx::query(
            "INSERT INTO lesson_progress (slug, status, viewed_at, completed_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(slug)
        .bind(status)
        .bind(viewed)
        .bind(completed)
        .execute(repo.pool())
        .await
        .unwrap();
    }

    repo.migrate().await.expect("upgrade");
    assert_eq!(repo.schema_version().await.unwrap(), SCHEMA_VERSION);

    let scan = repo.scan().await.unwrap();
    let loaded: Vec<&str> = scan.records.iter().map(|r| r.lesson_id().as_str()).collect();
    assert_eq!(loaded, ["finished", "viewed-only"]);

    let finished = &scan.records[0];
    assert!(!finished.is_quiz_passed());
    assert_eq!(
        finished.last_accessed_at().timestamp_millis(),
        completed_ms
    );
    let viewed_only = &scan.records[1];
    assert_eq!(viewed_only.last_accessed_at().timestamp_millis(), viewed_ms);

    let mut rejected: Vec<&str> = scan.rejected.iter().map(|r| r.slug.as_str()).collect();
    rejected.sort_unstable();
    assert_eq!(rejected, ["legacy-status", "no-timestamps"]);
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let repo = fresh_repo("memdb_too_new").await;
    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 'later')")
        .bind(i64::from(SCHEMA_VERSION + 1))
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo.migrate().await.unwrap_err();
    assert!(matches!(err, SqliteInitError::SchemaTooNew { .. }));
}

#[tokio::test]
async fn storage_sqlite_is_durable_and_migrated() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("open");
    assert!(storage.is_durable());
    assert_eq!(
        storage.progress.schema_version().await.unwrap(),
        SCHEMA_VERSION
    );
}
