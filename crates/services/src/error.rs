//! Shared error types for the services crate.

use thiserror::Error;

use course_core::GradeError;
use course_core::model::{CurriculumError, LessonId, SnapshotError};
use storage::repository::StorageError;

/// Errors emitted by `ProgressService` and the cache mutators built on it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("lesson {0} is not part of the curriculum")]
    UnknownLesson(LessonId),
    #[error("lesson {0} has no quiz")]
    NoQuiz(LessonId),
    #[error("lesson {0} is locked")]
    Locked(LessonId),
    #[error("malformed quiz submission: {0}")]
    Malformed(#[from] GradeError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
}

/// Durable storage could not be opened and the session fell back to memory.
///
/// This is a warning for the user, not a failure: every operation keeps
/// working, but nothing outlives the process.
#[derive(Debug, Clone, Error)]
#[error("progress storage is unavailable ({reason}); progress will only last for this session")]
pub struct StorageUnavailable {
    pub reason: String,
}
