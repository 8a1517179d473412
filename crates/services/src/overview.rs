use course_core::model::{CurriculumIndex, LessonId, LessonStatus, ModuleId};
use course_core::{UnlockPolicy, is_lesson_unlocked};
use serde::Serialize;

use crate::progress_cache::CacheSnapshot;

/// Counts for one run of consecutive lessons sharing a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOverview {
    pub module_id: Option<ModuleId>,
    pub lessons: usize,
    pub completed: usize,
    pub quiz_passed: usize,
    pub unlocked: usize,
}

impl ModuleOverview {
    fn empty(module_id: Option<ModuleId>) -> Self {
        Self {
            module_id,
            lessons: 0,
            completed: 0,
            quiz_passed: 0,
            unlocked: 0,
        }
    }
}

/// Course-wide progress summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOverview {
    pub modules: Vec<ModuleOverview>,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    /// First lesson in order that is open but not yet completed.
    pub next_lesson: Option<LessonId>,
}

impl CourseOverview {
    #[must_use]
    pub fn build(order: &CurriculumIndex, snapshot: &CacheSnapshot, policy: UnlockPolicy) -> Self {
        let mut modules: Vec<ModuleOverview> = Vec::new();
        let mut completed_lessons = 0;
        let mut next_lesson = None;

        for entry in order.entries() {
            let state = snapshot.state(&entry.lesson_id);
            let unlocked = is_lesson_unlocked(order, &entry.lesson_id, policy, |prev| {
                snapshot.state(prev)
            });
            let completed = state.status == LessonStatus::Completed;

            let starts_new_group = modules
                .last()
                .is_none_or(|group| group.module_id != entry.module_id);
            if starts_new_group {
                modules.push(ModuleOverview::empty(entry.module_id.clone()));
            }
            if let Some(group) = modules.last_mut() {
                group.lessons += 1;
                group.completed += usize::from(completed);
                group.quiz_passed += usize::from(state.quiz_passed);
                group.unlocked += usize::from(unlocked);
            }

            if completed {
                completed_lessons += 1;
            } else if unlocked && next_lesson.is_none() {
                next_lesson = Some(entry.lesson_id.clone());
            }
        }

        Self {
            modules,
            total_lessons: order.len(),
            completed_lessons,
            next_lesson,
        }
    }

    /// Whole-number share of completed lessons; 0 for an empty course.
    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        if self.total_lessons == 0 {
            return 0;
        }
        let percent = self.completed_lessons * 100 / self.total_lessons;
        u8::try_from(percent).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{LessonProgress, ProgressEvent};
    use course_core::time::fixed_now;

    fn snapshot_with(events: &[(&str, ProgressEvent)]) -> CacheSnapshot {
        let mut snapshot = CacheSnapshot::default();
        for (slug, event) in events {
            let id = LessonId::new(*slug);
            let existing = snapshot.lessons.remove(&id);
            let updated = LessonProgress::apply(existing, &id, *event, fixed_now());
            snapshot.lessons.insert(id, updated);
        }
        snapshot
    }

    #[test]
    fn empty_progress_points_at_first_lesson() {
        let order = CurriculumIndex::from_slugs(["a", "b", "c"]).unwrap();
        let overview = CourseOverview::build(&order, &CacheSnapshot::default(), UnlockPolicy::Strict);

        assert_eq!(overview.total_lessons, 3);
        assert_eq!(overview.completed_lessons, 0);
        assert_eq!(overview.next_lesson, Some(LessonId::new("a")));
        assert_eq!(overview.modules.len(), 1);
        assert_eq!(overview.modules[0].unlocked, 1);
        assert_eq!(overview.completion_percent(), 0);
    }

    #[test]
    fn passed_quiz_moves_next_lesson_forward() {
        let order = CurriculumIndex::from_slugs(["a", "b", "c"]).unwrap();
        let snapshot = snapshot_with(&[("a", ProgressEvent::QuizPassed)]);
        let overview = CourseOverview::build(&order, &snapshot, UnlockPolicy::Strict);

        assert_eq!(overview.completed_lessons, 1);
        assert_eq!(overview.next_lesson, Some(LessonId::new("b")));
        assert_eq!(overview.modules[0].quiz_passed, 1);
        assert_eq!(overview.modules[0].unlocked, 2);
        assert_eq!(overview.completion_percent(), 33);
    }

    #[test]
    fn completed_without_quiz_blocks_next_lesson_under_strict() {
        let order = CurriculumIndex::from_slugs(["a", "b"]).unwrap();
        let snapshot = snapshot_with(&[("a", ProgressEvent::Completed)]);
        let overview = CourseOverview::build(&order, &snapshot, UnlockPolicy::Strict);

        assert_eq!(overview.completed_lessons, 1);
        assert_eq!(overview.next_lesson, None);
    }

    #[test]
    fn empty_course_reports_zero_percent() {
        let order = CurriculumIndex::from_slugs(Vec::<&str>::new()).unwrap();
        let overview = CourseOverview::build(&order, &CacheSnapshot::default(), UnlockPolicy::default());
        assert_eq!(overview.completion_percent(), 0);
        assert!(overview.modules.is_empty());
    }
}
