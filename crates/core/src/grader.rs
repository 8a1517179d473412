use thiserror::Error;

use crate::model::QuizQuestion;

/// A submission that cannot be graded. Nothing is recorded for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradeError {
    #[error("quiz has no questions")]
    EmptyQuiz,

    #[error("expected {expected} answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },

    #[error("answer {selected} to question {question} is out of range for {options} options")]
    AnswerOutOfRange {
        question: usize,
        selected: usize,
        options: usize,
    },
}

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub passed: bool,
    pub correct_count: usize,
    pub incorrect_indices: Vec<usize>,
    pub pass_threshold: usize,
    pub total: usize,
}

/// Minimum number of correct answers out of `total`: `ceil(2/3 * total)`.
#[must_use]
pub fn pass_threshold(total: usize) -> usize {
    (2 * total).div_ceil(3)
}

/// Grade `selected` answers against `questions`.
///
/// The whole submission is checked before anything is scored.
///
/// # Errors
///
/// Returns `GradeError` if the quiz is empty, the answer count differs from
/// the question count, or an answer points outside its question's options.
pub fn grade(questions: &[QuizQuestion], selected: &[usize]) -> Result<QuizResult, GradeError> {
    if questions.is_empty() {
        return Err(GradeError::EmptyQuiz);
    }
    if selected.len() != questions.len() {
        return Err(GradeError::AnswerCountMismatch {
            expected: questions.len(),
            actual: selected.len(),
        });
    }
    for (question, (q, &answer)) in questions.iter().zip(selected).enumerate() {
        if answer >= q.options().len() {
            return Err(GradeError::AnswerOutOfRange {
                question,
                selected: answer,
                options: q.options().len(),
            });
        }
    }

    let incorrect_indices: Vec<usize> = questions
        .iter()
        .zip(selected)
        .enumerate()
        .filter(|(_, (q, answer))| q.correct_index() != **answer)
        .map(|(i, _)| i)
        .collect();
    let total = questions.len();
    let correct_count = total - incorrect_indices.len();
    let pass_threshold = pass_threshold(total);

    Ok(QuizResult {
        passed: correct_count >= pass_threshold,
        correct_count,
        incorrect_indices,
        pass_threshold,
        total,
    })
}
