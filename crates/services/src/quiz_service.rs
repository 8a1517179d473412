use std::sync::Arc;

use course_core::model::{CourseTree, CurriculumIndex, LessonId};
use course_core::{QuizResult, grade};
use tracing::info;

use crate::error::QuizServiceError;
use crate::progress_cache::ProgressCache;

/// Grades quiz submissions and records passes.
#[derive(Clone)]
pub struct QuizService {
    cache: Arc<ProgressCache>,
    tree: Arc<CourseTree>,
    order: Arc<CurriculumIndex>,
}

impl QuizService {
    #[must_use]
    pub fn new(cache: Arc<ProgressCache>, tree: Arc<CourseTree>, order: Arc<CurriculumIndex>) -> Self {
        Self { cache, tree, order }
    }

    /// Grade `selected` against the lesson's quiz.
    ///
    /// A passing result is recorded before returning; a failing one leaves
    /// progress untouched so the learner can retry.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the lesson is unknown, has no quiz, is
    /// still locked, if the answers do not fit the quiz, or if recording the
    /// pass fails.
    pub async fn submit(
        &self,
        id: &LessonId,
        selected: &[usize],
    ) -> Result<QuizResult, QuizServiceError> {
        let lesson = self
            .tree
            .lesson(id)
            .ok_or_else(|| QuizServiceError::UnknownLesson(id.clone()))?;
        let questions = lesson
            .quiz()
            .ok_or_else(|| QuizServiceError::NoQuiz(id.clone()))?;
        if !self.cache.is_lesson_unlocked(id, &self.order) {
            return Err(QuizServiceError::Locked(id.clone()));
        }

        let result = grade(questions, selected)?;
        if result.passed {
            self.cache.mark_quiz_passed(id).await?;
            info!(
                slug = %id,
                correct = result.correct_count,
                total = result.total,
                "quiz passed"
            );
        } else {
            info!(
                slug = %id,
                correct = result.correct_count,
                needed = result.pass_threshold,
                "quiz failed"
            );
        }
        Ok(result)
    }
}
