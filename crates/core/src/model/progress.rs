use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors raised when a persisted or imported progress record is inconsistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown lesson status: {0}")]
    UnknownStatus(String),

    #[error("lesson {slug} has a passed quiz but status {status}")]
    QuizPassedBeforeCompletion {
        slug: LessonId,
        status: LessonStatus,
    },

    #[error("lesson {slug} has {field} later than its last access")]
    TimestampAfterLastAccess {
        slug: LessonId,
        field: &'static str,
    },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a lesson.
///
/// The derived ordering follows the only direction a status may move:
/// `NotStarted < InProgress < Completed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl LessonStatus {
    /// Storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::NotStarted => "not_started",
            LessonStatus::InProgress => "in_progress",
            LessonStatus::Completed => "completed",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for any other value.
    pub fn parse(raw: &str) -> Result<Self, ProgressError> {
        match raw {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of a lesson's progress that gating and status reads depend on.
///
/// `LessonState::default()` is what an untouched lesson looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LessonState {
    pub status: LessonStatus,
    pub quiz_passed: bool,
}

/// A progress-changing event. These are the only ways a record is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Viewed,
    Completed,
    QuizPassed,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgressEvent::Viewed => "viewed",
            ProgressEvent::Completed => "completed",
            ProgressEvent::QuizPassed => "quiz_passed",
        })
    }
}

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// Progress of a single learner on a single lesson.
///
/// Invariants:
/// - `status` never moves backwards
/// - `quiz_passed` implies `status == Completed`
/// - `viewed_at` / `completed_at` are set once and never cleared
/// - `last_accessed_at` never moves backwards and is not earlier than either
///   of the other timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PersistedProgress", into = "PersistedProgress")]
pub struct LessonProgress {
    lesson_id: LessonId,
    status: LessonStatus,
    quiz_passed: bool,
    viewed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_accessed_at: DateTime<Utc>,
}

impl LessonProgress {
    /// Applies `event` to an existing record, or creates the record on first touch.
    #[must_use]
    pub fn apply(
        existing: Option<Self>,
        lesson_id: &LessonId,
        event: ProgressEvent,
        now: DateTime<Utc>,
    ) -> Self {
        let mut progress = existing.unwrap_or_else(|| Self {
            lesson_id: lesson_id.clone(),
            status: LessonStatus::NotStarted,
            quiz_passed: false,
            viewed_at: None,
            completed_at: None,
            last_accessed_at: now,
        });
        progress.record(event, now);
        progress
    }

    /// Applies `event` in place.
    pub fn record(&mut self, event: ProgressEvent, now: DateTime<Utc>) {
        match event {
            ProgressEvent::Viewed => {
                // A view never downgrades a completed lesson.
                if self.status < LessonStatus::InProgress {
                    self.status = LessonStatus::InProgress;
                }
                if self.viewed_at.is_none() {
                    self.viewed_at = Some(now);
                }
            }
            ProgressEvent::Completed => {
                self.status = LessonStatus::Completed;
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
            ProgressEvent::QuizPassed => {
                self.quiz_passed = true;
                self.status = LessonStatus::Completed;
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
        }
        self.last_accessed_at = self.last_accessed_at.max(now);
    }

    /// Rebuild a record from storage or an import, checking invariants.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the fields describe an impossible record.
    pub fn from_persisted(
        lesson_id: LessonId,
        status: LessonStatus,
        quiz_passed: bool,
        viewed_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        last_accessed_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if quiz_passed && status != LessonStatus::Completed {
            return Err(ProgressError::QuizPassedBeforeCompletion {
                slug: lesson_id,
                status,
            });
        }
        if viewed_at.is_some_and(|at| at > last_accessed_at) {
            return Err(ProgressError::TimestampAfterLastAccess {
                slug: lesson_id,
                field: "viewedAt",
            });
        }
        if completed_at.is_some_and(|at| at > last_accessed_at) {
            return Err(ProgressError::TimestampAfterLastAccess {
                slug: lesson_id,
                field: "completedAt",
            });
        }

        Ok(Self {
            lesson_id,
            status,
            quiz_passed,
            viewed_at,
            completed_at,
            last_accessed_at,
        })
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn status(&self) -> LessonStatus {
        self.status
    }

    #[must_use]
    pub fn is_quiz_passed(&self) -> bool {
        self.quiz_passed
    }

    #[must_use]
    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        self.viewed_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    #[must_use]
    pub fn state(&self) -> LessonState {
        LessonState {
            status: self.status,
            quiz_passed: self.quiz_passed,
        }
    }
}

/// Wire shape shared by exports and any consumer reading records verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedProgress {
    slug: LessonId,
    status: LessonStatus,
    #[serde(default)]
    quiz_passed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    viewed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    completed_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    last_accessed_at: DateTime<Utc>,
}

impl TryFrom<PersistedProgress> for LessonProgress {
    type Error = ProgressError;

    fn try_from(raw: PersistedProgress) -> Result<Self, Self::Error> {
        LessonProgress::from_persisted(
            raw.slug,
            raw.status,
            raw.quiz_passed,
            raw.viewed_at,
            raw.completed_at,
            raw.last_accessed_at,
        )
    }
}

impl From<LessonProgress> for PersistedProgress {
    fn from(progress: LessonProgress) -> Self {
        Self {
            slug: progress.lesson_id,
            status: progress.status,
            quiz_passed: progress.quiz_passed,
            viewed_at: progress.viewed_at,
            completed_at: progress.completed_at,
            last_accessed_at: progress.last_accessed_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
