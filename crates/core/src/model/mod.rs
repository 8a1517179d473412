mod curriculum;
mod ids;
mod progress;
mod quiz;
mod snapshot;

pub use ids::{LessonId, ModuleId, ParseIdError};

pub use curriculum::{
    CourseModule, CourseTree, CurriculumError, CurriculumIndex, IndexEntry, LessonEntry,
    LessonFrontmatter,
};
pub use progress::{LessonProgress, LessonState, LessonStatus, ProgressError, ProgressEvent};
pub use quiz::{MIN_OPTIONS, QuizError, QuizQuestion, QuizQuestionDraft};
pub use snapshot::{ProgressSnapshot, SCHEMA_VERSION, SnapshotError};
