use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use course_core::UnlockPolicy;
use course_core::model::{CourseTree, LessonId};

/// Track lesson progress and take quizzes for a local course.
#[derive(Debug, Parser)]
#[command(name = "course", version, about, long_about = None)]
pub struct Cli {
    /// Raise log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// `SQLite` database URL or path
    #[arg(
        long = "db",
        env = "COURSE_DB_URL",
        default_value = "sqlite://course-progress.sqlite3",
        global = true
    )]
    pub db_url: String,

    /// Curriculum JSON file
    #[arg(long, env = "COURSE_CURRICULUM", global = true)]
    pub curriculum: Option<PathBuf>,

    /// How a finished lesson opens the next one
    #[arg(
        long = "unlock-policy",
        env = "COURSE_UNLOCK_POLICY",
        default_value_t = UnlockPolicy::default(),
        global = true
    )]
    pub policy: UnlockPolicy,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show per-module progress and the next lesson
    Status,
    /// Open a lesson and print its content
    View { slug: LessonId },
    /// Mark a lesson as completed
    Complete { slug: LessonId },
    /// Submit quiz answers, one zero-based option index per question
    Quiz {
        slug: LessonId,
        #[arg(required = true)]
        answers: Vec<usize>,
    },
    /// Show the most recently accessed lesson
    Last,
    /// Write all progress as JSON to a file, or stdout
    Export { file: Option<PathBuf> },
    /// Replace progress with the records in an exported file
    Import { file: PathBuf },
    /// Forget all progress
    Reset {
        /// Confirm deleting every record
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}

impl Cli {
    #[must_use]
    pub fn database_url(&self) -> String {
        normalize_sqlite_url(&self.db_url)
    }

    /// Load the curriculum, or an empty course when none is configured.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid course tree.
    pub fn load_curriculum(&self) -> Result<CourseTree> {
        match &self.curriculum {
            Some(path) => read_curriculum(path),
            None => Ok(CourseTree::default()),
        }
    }
}

fn read_curriculum(path: &Path) -> Result<CourseTree> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read curriculum {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse curriculum {}", path.display()))
}

/// Turn a bare path or relative `sqlite:` URL into an absolute URL that
/// creates the file when missing.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite:file:") {
        return trimmed.to_string();
    }

    let without_scheme = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = match without_scheme.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_scheme, None),
    };

    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    let query = match query {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{query}", absolute.display())
}

/// Create the parent directory of a file-backed database.
///
/// # Errors
///
/// Fails if the URL has no path or the directory cannot be created.
pub fn prepare_sqlite_dir(db_url: &str) -> Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
