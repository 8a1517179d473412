//! Lesson lock state.
//!
//! A lesson is open when it is first in the curriculum, or when its direct
//! predecessor satisfies the unlock rule. Because the predecessor could only
//! reach that state after being open itself, looking one step back is enough
//! to enforce the whole chain.

use std::fmt;
use std::str::FromStr;

use crate::model::{CurriculumIndex, LessonId, LessonState, LessonStatus};

/// How a predecessor lesson has to be finished before its successor opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlockPolicy {
    /// The predecessor must have a passed quiz, whether or not it defines one.
    Strict,
    /// Predecessors with a quiz must have it passed; predecessors without a
    /// quiz only need to be completed.
    #[default]
    CompletionForQuizless,
}

impl UnlockPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UnlockPolicy::Strict => "strict",
            UnlockPolicy::CompletionForQuizless => "completion-for-quizless",
        }
    }

    fn satisfied_by(self, has_quiz: bool, state: LessonState) -> bool {
        match self {
            UnlockPolicy::Strict => state.quiz_passed,
            UnlockPolicy::CompletionForQuizless if has_quiz => state.quiz_passed,
            UnlockPolicy::CompletionForQuizless => state.status == LessonStatus::Completed,
        }
    }
}

impl fmt::Display for UnlockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnlockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strict" => Ok(Self::Strict),
            "completion-for-quizless" => Ok(Self::CompletionForQuizless),
            other => Err(format!("unknown unlock policy: {other}")),
        }
    }
}

/// Whether `lesson` is accessible.
///
/// `state_of` reports the persisted state of a lesson, returning
/// `LessonState::default()` for lessons never touched. Lessons outside the
/// curriculum are always locked.
pub fn is_lesson_unlocked<F>(
    index: &CurriculumIndex,
    lesson: &LessonId,
    policy: UnlockPolicy,
    state_of: F,
) -> bool
where
    F: FnOnce(&LessonId) -> LessonState,
{
    match index.position(lesson) {
        None => false,
        Some(0) => true,
        Some(_) => index.predecessor(lesson).is_some_and(|prev| {
            policy.satisfied_by(prev.has_quiz, state_of(&prev.lesson_id))
        }),
    }
}
