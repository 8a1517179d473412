use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;
use course_core::UnlockPolicy;
use course_core::model::{
    CourseModule, CourseTree, CurriculumError, CurriculumIndex, LessonEntry, LessonFrontmatter, LessonId,
    LessonStatus, ModuleId, QuizQuestion,
};
use course_core::time::fixed_now;
use services::{AppServices, AppServicesError, Clock, ProgressCache, ProgressService};
use storage::sqlite::SqliteRepository;

fn shared_memory_url(name: &str) -> String {
    format!("sqlite:file:{name}?mode=memory&cache=shared")
}

fn quiz() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion::new("2 + 2", vec!["3".into(), "4".into()], 1).unwrap(),
        QuizQuestion::new("3 + 3", vec!["6".into(), "7".into()], 0).unwrap(),
    ]
}

fn lesson(slug: &str, order: u32) -> LessonEntry {
    LessonEntry {
        slug: LessonId::new(slug),
        frontmatter: LessonFrontmatter {
            title: format!("Lesson {slug}"),
            order,
            quiz: Some(quiz()),
        },
        content: format!("# {slug}"),
    }
}

fn course() -> CourseTree {
    CourseTree {
        modules: vec![
            CourseModule {
                id: ModuleId::new("m1"),
                name: "First".into(),
                lessons: vec![lesson("a", 1), lesson("b", 2)],
            },
            CourseModule {
                id: ModuleId::new("m2"),
                name: "Second".into(),
                lessons: vec![lesson("c", 1)],
            },
        ],
    }
}

fn id(slug: &str) -> LessonId {
    LessonId::new(slug)
}

#[tokio::test]
async fn learner_walks_the_course_in_order() {
    let clock = Clock::manual(fixed_now());
    let app = AppServices::open(
        &shared_memory_url("flow_walk"),
        clock.clone(),
        course(),
        UnlockPolicy::Strict,
    )
    .await
    .unwrap();
    assert!(app.is_durable());
    assert!(app.storage_warning().is_none());

    let cache = app.cache();
    let order = app.order();
    assert!(cache.is_lesson_unlocked(&id("a"), order));
    assert!(!cache.is_lesson_unlocked(&id("b"), order));
    assert!(!cache.is_lesson_unlocked(&id("c"), order));

    cache.mark_viewed(&id("a")).await.unwrap();
    assert_eq!(cache.status(&id("a")), LessonStatus::InProgress);

    clock.advance(Duration::seconds(5));
    let result = app.quiz().submit(&id("a"), &[1, 0]).await.unwrap();
    assert!(result.passed);
    assert!(cache.is_lesson_unlocked(&id("b"), order));
    assert!(!cache.is_lesson_unlocked(&id("c"), order));

    clock.advance(Duration::seconds(5));
    cache.mark_viewed(&id("b")).await.unwrap();
    let last = cache.last_accessed_lesson().unwrap();
    assert_eq!(last.lesson_id(), &id("b"));

    let overview = app.overview();
    assert_eq!(overview.modules.len(), 2);
    assert_eq!(overview.completed_lessons, 1);
    assert_eq!(overview.next_lesson, Some(id("b")));
}

#[tokio::test]
async fn progress_survives_a_new_session_on_the_same_database() {
    let url = shared_memory_url("flow_restart");
    let first = AppServices::open(&url, Clock::fixed(fixed_now()), course(), UnlockPolicy::Strict)
        .await
        .unwrap();
    first.quiz().submit(&id("a"), &[1, 0]).await.unwrap();

    let second = AppServices::open(&url, Clock::fixed(fixed_now()), course(), UnlockPolicy::Strict)
        .await
        .unwrap();
    let cache = second.cache();
    assert!(cache.is_quiz_passed(&id("a")));
    assert!(cache.is_lesson_unlocked(&id("b"), second.order()));
    drop(first);
}

#[tokio::test]
async fn failed_quiz_keeps_successor_locked() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()), course(), UnlockPolicy::Strict)
        .await
        .unwrap();
    let result = app.quiz().submit(&id("a"), &[0, 1]).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.incorrect_indices, vec![0, 1]);
    assert!(!app.cache().is_lesson_unlocked(&id("b"), app.order()));
}

#[tokio::test]
async fn unusable_database_falls_back_to_memory_with_warning() {
    let app = AppServices::open(
        "not-a-database://nowhere",
        Clock::fixed(fixed_now()),
        course(),
        UnlockPolicy::default(),
    )
    .await
    .unwrap();

    assert!(!app.is_durable());
    let warning = app.storage_warning().expect("warning set");
    assert!(warning.to_string().contains("only last for this session"));

    app.cache().mark_viewed(&id("a")).await.unwrap();
    assert_eq!(app.cache().status(&id("a")), LessonStatus::InProgress);
}

#[tokio::test]
async fn export_then_import_into_a_fresh_database() {
    let source = AppServices::open(
        &shared_memory_url("flow_export_src"),
        Clock::fixed(fixed_now()),
        course(),
        UnlockPolicy::Strict,
    )
    .await
    .unwrap();
    source.cache().mark_viewed(&id("a")).await.unwrap();
    source.quiz().submit(&id("a"), &[1, 0]).await.unwrap();
    source.cache().mark_viewed(&id("b")).await.unwrap();

    let snapshot = source.cache().export_snapshot().await.unwrap();
    let json = serde_json::to_string(&snapshot).unwrap();

    let target = AppServices::open(
        &shared_memory_url("flow_export_dst"),
        Clock::fixed(fixed_now()),
        course(),
        UnlockPolicy::Strict,
    )
    .await
    .unwrap();
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    target.cache().subscribe(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let written = target
        .cache()
        .import_snapshot(serde_json::from_str(&json).unwrap())
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(
        target.cache().snapshot().lessons,
        source.cache().snapshot().lessons
    );
}

#[tokio::test]
async fn malformed_curriculum_is_refused() {
    let mut tree = course();
    tree.modules[1].lessons.push(lesson("a", 2));
    let err = AppServices::in_memory(Clock::fixed(fixed_now()), tree, UnlockPolicy::Strict)
        .await
        .err()
        .expect("duplicate slug rejected");
    assert!(matches!(
        err,
        AppServicesError::Curriculum(CurriculumError::DuplicateLesson(_))
    ));
}

#[tokio::test]
async fn legacy_row_without_timestamps_does_not_block_its_lesson() {
    let repo = SqliteRepository::connect(&shared_memory_url("flow_legacy_row"))
        .await
        .unwrap();
    repo.migrate_to(1).await.unwrap();
    sqlx::query("INSERT INTO lesson_progress (slug, status) VALUES ('a', 'in_progress')")
        .execute(repo.pool())
        .await
        .unwrap();
    repo.migrate().await.unwrap();

    let progress = ProgressService::new(Clock::fixed(fixed_now()), Arc::new(repo));
    let cache = ProgressCache::load(progress, UnlockPolicy::Strict).await;
    let rejected: Vec<String> = cache.rejected_records().into_iter().map(|r| r.slug).collect();
    assert_eq!(rejected, ["a"]);

    let order = CurriculumIndex::from_slugs(["a", "b"]).unwrap();
    cache.mark_viewed(&id("a")).await.unwrap();
    cache.mark_quiz_passed(&id("a")).await.unwrap();

    assert!(cache.rejected_records().is_empty());
    assert!(cache.is_quiz_passed(&id("a")));
    assert!(cache.is_lesson_unlocked(&id("b"), &order));
}

#[tokio::test]
async fn concurrent_mutations_leave_cache_matching_the_store() {
    let app = AppServices::open(
        &shared_memory_url("flow_concurrent"),
        Clock::fixed(fixed_now()),
        course(),
        UnlockPolicy::Strict,
    )
    .await
    .unwrap();
    let cache = app.cache();

    let (id_a, id_b, id_c) = (id("a"), id("b"), id("c"));
    let (a, b, c) = tokio::join!(
        cache.mark_viewed(&id_a),
        cache.mark_completed(&id_b),
        cache.mark_viewed(&id_c),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let stored = cache.progress().get_all_progress().await.unwrap();
    let cached = cache.snapshot();
    assert_eq!(cached.lessons.len(), 3);
    for (slug, record) in &stored {
        assert_eq!(cached.lessons.get(slug), Some(record));
    }
    assert_eq!(
        cache.progress().schema_version().await.unwrap(),
        course_core::model::SCHEMA_VERSION
    );
}
