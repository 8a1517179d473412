use std::path::Path;

use anyhow::{Context, Result, bail};
use course_core::model::{LessonId, ModuleId, ProgressSnapshot};
use services::AppServices;

use crate::config::Command;

pub async fn run(app: &AppServices, command: Command) -> Result<()> {
    match command {
        Command::Status => status(app).await,
        Command::View { slug } => view(app, &slug).await,
        Command::Complete { slug } => complete(app, &slug).await,
        Command::Quiz { slug, answers } => quiz(app, &slug, &answers).await,
        Command::Last => last(app),
        Command::Export { file } => export(app, file.as_deref()).await,
        Command::Import { file } => import(app, &file).await,
        Command::Reset { yes } => reset(app, yes).await,
    }
}

fn ensure_unlocked(app: &AppServices, slug: &LessonId) -> Result<()> {
    if app.tree().lesson(slug).is_none() {
        bail!("unknown lesson: {slug}");
    }
    if !app.cache().is_lesson_unlocked(slug, app.order()) {
        bail!("lesson {slug} is locked; finish the previous lesson first");
    }
    Ok(())
}

fn module_name(app: &AppServices, module_id: Option<&ModuleId>) -> String {
    module_id
        .and_then(|id| app.tree().modules.iter().find(|module| &module.id == id))
        .map_or_else(|| "course".to_string(), |module| module.name.clone())
}

async fn status(app: &AppServices) -> Result<()> {
    let overview = app.overview();
    let cache = app.cache();
    let snapshot = cache.snapshot();
    let mut entries = app.order().entries().iter();

    for module in &overview.modules {
        let name = module_name(app, module.module_id.as_ref());
        println!("{name}: {}/{} completed", module.completed, module.lessons);

        for entry in entries.by_ref().take(module.lessons) {
            let state = snapshot.state(&entry.lesson_id);
            let lock = if cache.is_lesson_unlocked(&entry.lesson_id, app.order()) {
                " "
            } else {
                "x"
            };
            let quiz = if state.quiz_passed { ", quiz passed" } else { "" };
            println!("  [{lock}] {} ({}{quiz})", entry.lesson_id, state.status);
        }
    }

    println!(
        "{}/{} lessons completed ({}%)",
        overview.completed_lessons,
        overview.total_lessons,
        overview.completion_percent()
    );
    if let Some(next) = overview.next_lesson {
        println!("next: {next}");
    }

    let schema = cache.progress().schema_version().await?;
    if app.is_durable() {
        println!("storage: sqlite, schema v{schema}");
    } else {
        println!("storage: in memory, schema v{schema}");
    }
    Ok(())
}

async fn view(app: &AppServices, slug: &LessonId) -> Result<()> {
    ensure_unlocked(app, slug)?;
    let lesson = app
        .tree()
        .lesson(slug)
        .with_context(|| format!("unknown lesson: {slug}"))?;
    app.cache().mark_viewed(slug).await?;

    println!("# {}", lesson.frontmatter.title);
    println!();
    println!("{}", lesson.content);
    if let Some(questions) = lesson.quiz() {
        println!();
        println!("quiz:");
        for (number, question) in questions.iter().enumerate() {
            println!("  {}. {}", number + 1, question.question());
            for (index, option) in question.options().iter().enumerate() {
                println!("     {index}) {option}");
            }
        }
    }
    Ok(())
}

async fn complete(app: &AppServices, slug: &LessonId) -> Result<()> {
    ensure_unlocked(app, slug)?;
    let progress = app.cache().mark_completed(slug).await?;
    println!("{slug}: {}", progress.status());
    Ok(())
}

async fn quiz(app: &AppServices, slug: &LessonId, answers: &[usize]) -> Result<()> {
    let result = app.quiz().submit(slug, answers).await?;
    println!(
        "{}/{} correct (need {})",
        result.correct_count, result.total, result.pass_threshold
    );
    if result.passed {
        println!("passed");
    } else {
        let missed: Vec<String> = result
            .incorrect_indices
            .iter()
            .map(|index| (index + 1).to_string())
            .collect();
        println!("not passed; review question(s) {}", missed.join(", "));
    }
    Ok(())
}

fn last(app: &AppServices) -> Result<()> {
    match app.cache().last_accessed_lesson() {
        Some(progress) => println!(
            "{} ({}) at {}",
            progress.lesson_id(),
            progress.status(),
            progress.last_accessed_at().to_rfc3339()
        ),
        None => println!("no lessons accessed yet"),
    }
    Ok(())
}

async fn export(app: &AppServices, file: Option<&Path>) -> Result<()> {
    let snapshot = app.cache().export_snapshot().await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    match file {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "exported {} lesson(s) to {}",
                snapshot.lessons.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn import(app: &AppServices, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let snapshot: ProgressSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a progress export", file.display()))?;
    let written = app.cache().import_snapshot(snapshot).await?;
    println!("imported {written} lesson(s)");
    Ok(())
}

async fn reset(app: &AppServices, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("reset deletes all progress; rerun with --yes to confirm");
    }
    app.cache().reset().await?;
    println!("progress cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::UnlockPolicy;
    use course_core::model::{CourseModule, CourseTree};
    use services::Clock;

    #[tokio::test]
    async fn module_names_come_from_the_curriculum() {
        let tree = CourseTree {
            modules: vec![CourseModule {
                id: ModuleId::new("basics"),
                name: "The Basics".into(),
                lessons: Vec::new(),
            }],
        };
        let app = AppServices::in_memory(Clock::default_clock(), tree, UnlockPolicy::default())
            .await
            .unwrap();

        assert_eq!(
            module_name(&app, Some(&ModuleId::new("basics"))),
            "The Basics"
        );
        assert_eq!(module_name(&app, Some(&ModuleId::new("other"))), "course");
        assert_eq!(module_name(&app, None), "course");
    }
}
