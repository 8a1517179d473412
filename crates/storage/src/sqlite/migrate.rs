use chrono::Utc;
use course_core::model::SCHEMA_VERSION;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::SqliteInitError;

/// One schema upgrade step.
///
/// `skip_if` is a probe query: when it returns a row the step's effect is
/// already present, so only the version is recorded.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    skip_if: Option<&'static str>,
    statements: &'static [&'static str],
}

/// Ordered upgrade steps; the last one is always `SCHEMA_VERSION`.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create lesson_progress",
        skip_if: None,
        statements: &[r"
            CREATE TABLE IF NOT EXISTS lesson_progress (
                slug TEXT PRIMARY KEY NOT NULL,
                status TEXT NOT NULL,
                viewed_at INTEGER,
                completed_at INTEGER,
                last_accessed_at INTEGER
            );
        "],
    },
    Migration {
        version: 2,
        description: "add quiz_passed, defaulting existing rows to false",
        skip_if: Some(
            "SELECT 1 FROM pragma_table_info('lesson_progress') WHERE name = 'quiz_passed'",
        ),
        statements: &[r"
            ALTER TABLE lesson_progress
                ADD COLUMN quiz_passed INTEGER NOT NULL DEFAULT 0;
        "],
    },
    Migration {
        version: 3,
        description: "backfill last_accessed_at and index it",
        skip_if: None,
        // Rows with neither timestamp stay NULL and are rejected on read.
        statements: &[
            r"
            UPDATE lesson_progress
            SET last_accessed_at = MAX(
                COALESCE(viewed_at, completed_at),
                COALESCE(completed_at, viewed_at)
            )
            WHERE last_accessed_at IS NULL
              AND (viewed_at IS NOT NULL OR completed_at IS NOT NULL);
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_lesson_progress_last_accessed
                ON lesson_progress (last_accessed_at DESC, slug);
            ",
        ],
    },
];

/// Version recorded in `schema_migrations`, or 0 for a fresh database.
pub(crate) async fn current_version(pool: &SqlitePool) -> Result<u32, sqlx::Error> {
    let version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(pool)
            .await?;
    Ok(u32::try_from(version).unwrap_or(0))
}

/// Runs every pending migration.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    run_migrations_to(pool, SCHEMA_VERSION).await
}

/// Runs pending migrations with `version <= target`, each in its own transaction.
pub async fn run_migrations_to(pool: &SqlitePool, target: u32) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    let current = current_version(pool).await?;
    if current > SCHEMA_VERSION {
        return Err(SqliteInitError::SchemaTooNew {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        let mut tx = pool.begin().await?;

        let already_present = match migration.skip_if {
            Some(probe) => sqlx::query(probe).fetch_optional(&mut *tx).await?.is_some(),
            None => false,
        };
        if already_present {
            debug!(version = migration.version, "migration effect already present");
        } else {
            for statement in migration.statements {
                sqlx::query(*statement).execute(&mut *tx).await?;
            }
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(i64::from(migration.version))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            version = migration.version,
            description = migration.description,
            "applied schema migration"
        );
    }

    Ok(())
}
