use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId};
use crate::model::quiz::QuizQuestion;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("lesson slug cannot be empty")]
    EmptySlug,

    #[error("lesson {0} appears more than once in the curriculum")]
    DuplicateLesson(LessonId),
}

//
// ─── CONTENT TREE ──────────────────────────────────────────────────────────────
//

/// Module/lesson tree handed over by the content pipeline.
///
/// Modules and lessons are expected to be sorted already; nothing here
/// re-orders them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CourseTree {
    pub modules: Vec<CourseModule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub lessons: Vec<LessonEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonEntry {
    pub slug: LessonId,
    pub frontmatter: LessonFrontmatter,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonFrontmatter {
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Vec<QuizQuestion>>,
}

impl LessonEntry {
    /// Quiz questions for this lesson, if it defines a non-empty quiz.
    #[must_use]
    pub fn quiz(&self) -> Option<&[QuizQuestion]> {
        self.frontmatter
            .quiz
            .as_deref()
            .filter(|questions| !questions.is_empty())
    }
}

impl CourseTree {
    /// Find a lesson anywhere in the tree.
    #[must_use]
    pub fn lesson(&self, id: &LessonId) -> Option<&LessonEntry> {
        self.modules
            .iter()
            .flat_map(|module| module.lessons.iter())
            .find(|lesson| &lesson.slug == id)
    }
}

//
// ─── INDEX ─────────────────────────────────────────────────────────────────────
//

/// One position in the flattened curriculum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub lesson_id: LessonId,
    pub module_id: Option<ModuleId>,
    pub has_quiz: bool,
}

/// Flattened, stable ordering of every lesson in the course.
///
/// Built from the same tree, the index always has the same order: module
/// order first, then lesson order within each module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurriculumIndex {
    entries: Vec<IndexEntry>,
    positions: HashMap<LessonId, usize>,
}

impl CurriculumIndex {
    /// Flatten a content tree.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` if a slug is blank or appears twice.
    pub fn from_tree(tree: &CourseTree) -> Result<Self, CurriculumError> {
        let entries = tree.modules.iter().flat_map(|module| {
            module.lessons.iter().map(|lesson| IndexEntry {
                lesson_id: lesson.slug.clone(),
                module_id: Some(module.id.clone()),
                has_quiz: lesson.quiz().is_some(),
            })
        });
        Self::from_entries(entries)
    }

    /// Build an index from an already ordered list of slugs.
    ///
    /// Every lesson is assumed to carry a quiz, since nothing else is known
    /// about it.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` if a slug is blank or appears twice.
    pub fn from_slugs<I>(slugs: I) -> Result<Self, CurriculumError>
    where
        I: IntoIterator,
        I::Item: Into<LessonId>,
    {
        Self::from_entries(slugs.into_iter().map(|slug| IndexEntry {
            lesson_id: slug.into(),
            module_id: None,
            has_quiz: true,
        }))
    }

    fn from_entries(
        entries: impl Iterator<Item = IndexEntry>,
    ) -> Result<Self, CurriculumError> {
        let mut index = Self::default();
        for entry in entries {
            if entry.lesson_id.as_str().trim().is_empty() {
                return Err(CurriculumError::EmptySlug);
            }
            if index.positions.contains_key(&entry.lesson_id) {
                return Err(CurriculumError::DuplicateLesson(entry.lesson_id));
            }
            index
                .positions
                .insert(entry.lesson_id.clone(), index.entries.len());
            index.entries.push(entry);
        }
        Ok(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn lesson_ids(&self) -> impl Iterator<Item = &LessonId> {
        self.entries.iter().map(|entry| &entry.lesson_id)
    }

    #[must_use]
    pub fn position(&self, id: &LessonId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    #[must_use]
    pub fn get(&self, id: &LessonId) -> Option<&IndexEntry> {
        self.position(id).map(|pos| &self.entries[pos])
    }

    /// The lesson immediately before `id`, or `None` for the first lesson
    /// and for lessons outside the curriculum.
    #[must_use]
    pub fn predecessor(&self, id: &LessonId) -> Option<&IndexEntry> {
        let pos = self.position(id)?;
        pos.checked_sub(1).map(|prev| &self.entries[prev])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(slug: &str, quiz: bool) -> LessonEntry {
        let quiz = quiz.then(|| {
            vec![QuizQuestion::new("Q", vec!["a".into(), "b".into()], 0).unwrap()]
        });
        LessonEntry {
            slug: LessonId::new(slug),
            frontmatter: LessonFrontmatter {
                title: slug.to_uppercase(),
                order: 0,
                quiz,
            },
            content: String::new(),
        }
    }

    fn tree() -> CourseTree {
        CourseTree {
            modules: vec![
                CourseModule {
                    id: ModuleId::new("basics"),
                    name: "Basics".into(),
                    lessons: vec![lesson("returns", true), lesson("volatility", false)],
                },
                CourseModule {
                    id: ModuleId::new("portfolio"),
                    name: "Portfolio".into(),
                    lessons: vec![lesson("diversification", true)],
                },
            ],
        }
    }

    #[test]
    fn flattens_module_then_lesson_order() {
        let index = CurriculumIndex::from_tree(&tree()).unwrap();
        let order: Vec<&str> = index.lesson_ids().map(LessonId::as_str).collect();
        assert_eq!(order, ["returns", "volatility", "diversification"]);
        assert_eq!(
            index.get(&LessonId::new("diversification")).unwrap().module_id,
            Some(ModuleId::new("portfolio"))
        );
    }

    #[test]
    fn same_tree_gives_same_index() {
        assert_eq!(
            CurriculumIndex::from_tree(&tree()).unwrap(),
            CurriculumIndex::from_tree(&tree()).unwrap()
        );
    }

    #[test]
    fn records_quiz_presence() {
        let index = CurriculumIndex::from_tree(&tree()).unwrap();
        assert!(index.get(&LessonId::new("returns")).unwrap().has_quiz);
        assert!(!index.get(&LessonId::new("volatility")).unwrap().has_quiz);
    }

    #[test]
    fn predecessor_follows_flattened_order() {
        let index = CurriculumIndex::from_tree(&tree()).unwrap();
        assert_eq!(index.predecessor(&LessonId::new("returns")), None);
        assert_eq!(
            index
                .predecessor(&LessonId::new("diversification"))
                .map(|e| e.lesson_id.as_str()),
            Some("volatility")
        );
        assert_eq!(index.predecessor(&LessonId::new("missing")), None);
    }

    #[test]
    fn rejects_duplicate_slugs() {
        let err = CurriculumIndex::from_slugs(["a", "b", "a"]).unwrap_err();
        assert_eq!(err, CurriculumError::DuplicateLesson(LessonId::new("a")));
    }

    #[test]
    fn empty_quiz_list_counts_as_no_quiz() {
        let mut entry = lesson("x", false);
        entry.frontmatter.quiz = Some(Vec::new());
        assert!(entry.quiz().is_none());
    }

    #[test]
    fn deserializes_content_tree() {
        let json = r##"{
            "modules": [{
                "id": "basics",
                "name": "Basics",
                "lessons": [{
                    "slug": "returns",
                    "frontmatter": {
                        "title": "Returns",
                        "order": 1,
                        "quiz": [{"question": "Q", "options": ["a", "b"], "correctIndex": 1}]
                    },
                    "content": "# Returns"
                }]
            }]
        }"##;
        let tree: CourseTree = serde_json::from_str(json).unwrap();
        let lesson = tree.lesson(&LessonId::new("returns")).unwrap();
        assert_eq!(lesson.quiz().map(<[QuizQuestion]>::len), Some(1));
    }
}
