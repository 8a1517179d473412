use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of options a question must offer.
pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("a question needs at least {MIN_OPTIONS} options, found {found}")]
    TooFewOptions { found: usize },

    #[error("correct option {index} is out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },
}

/// Unvalidated quiz question, as supplied by lesson frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuizQuestionDraft {
    /// Validate the draft into a gradeable question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the text is blank, fewer than two options are
    /// given, or the correct index does not point at an option.
    pub fn validate(self) -> Result<QuizQuestion, QuizError> {
        if self.question.trim().is_empty() {
            return Err(QuizError::EmptyQuestion);
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(QuizError::TooFewOptions {
                found: self.options.len(),
            });
        }
        if self.correct_index >= self.options.len() {
            return Err(QuizError::CorrectIndexOutOfRange {
                index: self.correct_index,
                options: self.options.len(),
            });
        }

        Ok(QuizQuestion {
            question: self.question,
            options: self.options,
            correct_index: self.correct_index,
        })
    }
}

/// A multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuizQuestionDraft")]
pub struct QuizQuestion {
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

impl QuizQuestion {
    /// Build and validate a question.
    ///
    /// # Errors
    ///
    /// See [`QuizQuestionDraft::validate`].
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Result<Self, QuizError> {
        QuizQuestionDraft {
            question: question.into(),
            options,
            correct_index,
        }
        .validate()
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }
}

impl TryFrom<QuizQuestionDraft> for QuizQuestion {
    type Error = QuizError;

    fn try_from(draft: QuizQuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}
