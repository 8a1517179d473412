use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use course_core::model::{
    CurriculumIndex, LessonId, LessonProgress, LessonState, LessonStatus, ProgressSnapshot,
};
use course_core::{UnlockPolicy, is_lesson_unlocked};
use storage::repository::{ProgressScan, RejectedRecord};
use tracing::{debug, warn};

use crate::error::ProgressServiceError;
use crate::overview::CourseOverview;
use crate::progress_service::{ProgressService, most_recently_accessed};

/// Immutable view of the store as of the last successful reload.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub lessons: HashMap<LessonId, LessonProgress>,
    pub last_accessed: Option<LessonProgress>,
    pub rejected: Vec<RejectedRecord>,
}

impl CacheSnapshot {
    fn from_scan(scan: ProgressScan) -> Self {
        let last_accessed = most_recently_accessed(&scan.records).cloned();
        let lessons = scan
            .records
            .into_iter()
            .map(|record| (record.lesson_id().clone(), record))
            .collect();
        Self {
            lessons,
            last_accessed,
            rejected: scan.rejected,
        }
    }

    /// State of one lesson, with untouched lessons reported as not started.
    #[must_use]
    pub fn state(&self, id: &LessonId) -> LessonState {
        self.lessons
            .get(id)
            .map(LessonProgress::state)
            .unwrap_or_default()
    }
}

/// Callback invoked after every successful reload.
pub type ProgressListener = Arc<dyn Fn(&CacheSnapshot) + Send + Sync>;

/// Snapshot tagged with the reload that produced it.
struct Published {
    generation: u64,
    snapshot: Arc<CacheSnapshot>,
}

/// Handle returned by [`ProgressCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// In-memory mirror of the progress store.
///
/// Reads are synchronous and never touch storage. Every mutation writes
/// through `ProgressService`, then reloads the whole store and notifies
/// listeners. Reloads are numbered when they start; a scan that finishes
/// after a newer one has been published is discarded.
pub struct ProgressCache {
    progress: ProgressService,
    policy: UnlockPolicy,
    state: RwLock<Published>,
    next_generation: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, ProgressListener)>>,
    next_listener: AtomicU64,
}

impl ProgressCache {
    /// Build the cache and load the store into it.
    ///
    /// A failed initial load leaves the cache empty instead of failing.
    pub async fn load(progress: ProgressService, policy: UnlockPolicy) -> Self {
        let cache = Self {
            progress,
            policy,
            state: RwLock::new(Published {
                generation: 0,
                snapshot: Arc::new(CacheSnapshot::default()),
            }),
            next_generation: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        };
        if let Err(err) = cache.reload().await {
            warn!(error = %err, "initial progress load failed; starting with empty state");
        }
        cache
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }

    #[must_use]
    pub fn policy(&self) -> UnlockPolicy {
        self.policy
    }

    /// Re-read the store and notify listeners.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the store cannot be read; the
    /// previous snapshot stays in place and listeners are not called.
    pub async fn reload(&self) -> Result<(), ProgressServiceError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let scan = self.progress.load_all().await?;
        let snapshot = Arc::new(CacheSnapshot::from_scan(scan));
        {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if guard.generation > generation {
                debug!(generation, published = guard.generation, "discarding stale reload");
                return Ok(());
            }
            *guard = Published {
                generation,
                snapshot: Arc::clone(&snapshot),
            };
        }
        debug!(generation, lessons = snapshot.lessons.len(), "progress cache reloaded");
        self.notify(&snapshot);
        Ok(())
    }

    fn notify(&self, snapshot: &CacheSnapshot) {
        // Listeners run without the registry lock so they may (un)subscribe.
        let listeners: Vec<ProgressListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    /// Register a listener called after each successful reload.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheSnapshot) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let listener: ProgressListener = Arc::new(listener);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|(existing, _)| *existing != id);
        guard.len() != before
    }

    // ─── Synchronous reads ───────────────────────────────────────────────────

    /// The current snapshot. Cheap to clone and safe to hold.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.snapshot)
    }

    #[must_use]
    pub fn progress_of(&self, id: &LessonId) -> Option<LessonProgress> {
        self.snapshot().lessons.get(id).cloned()
    }

    #[must_use]
    pub fn status(&self, id: &LessonId) -> LessonStatus {
        self.snapshot().state(id).status
    }

    #[must_use]
    pub fn is_quiz_passed(&self, id: &LessonId) -> bool {
        self.snapshot().state(id).quiz_passed
    }

    #[must_use]
    pub fn is_lesson_unlocked(&self, id: &LessonId, order: &CurriculumIndex) -> bool {
        let snapshot = self.snapshot();
        is_lesson_unlocked(order, id, self.policy, |prev| snapshot.state(prev))
    }

    #[must_use]
    pub fn last_accessed_lesson(&self) -> Option<LessonProgress> {
        self.snapshot().last_accessed.clone()
    }

    /// Records dropped during the last reload because they could not be read.
    #[must_use]
    pub fn rejected_records(&self) -> Vec<RejectedRecord> {
        self.snapshot().rejected.clone()
    }

    #[must_use]
    pub fn overview(&self, order: &CurriculumIndex) -> CourseOverview {
        CourseOverview::build(order, &self.snapshot(), self.policy)
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the write or the reload fails.
    pub async fn mark_viewed(&self, id: &LessonId) -> Result<LessonProgress, ProgressServiceError> {
        let updated = self.progress.mark_viewed(id).await?;
        self.reload().await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the write or the reload fails.
    pub async fn mark_completed(
        &self,
        id: &LessonId,
    ) -> Result<LessonProgress, ProgressServiceError> {
        let updated = self.progress.mark_completed(id).await?;
        self.reload().await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the write or the reload fails.
    pub async fn mark_quiz_passed(
        &self,
        id: &LessonId,
    ) -> Result<LessonProgress, ProgressServiceError> {
        let updated = self.progress.mark_quiz_passed(id).await?;
        self.reload().await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the store cannot be read.
    pub async fn export_snapshot(&self) -> Result<ProgressSnapshot, ProgressServiceError> {
        self.progress.export_snapshot().await
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the document is invalid, the write
    /// fails, or the reload fails.
    pub async fn import_snapshot(
        &self,
        snapshot: ProgressSnapshot,
    ) -> Result<usize, ProgressServiceError> {
        let written = self.progress.import_snapshot(snapshot).await?;
        self.reload().await?;
        Ok(written)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the delete or the reload fails.
    pub async fn reset(&self) -> Result<(), ProgressServiceError> {
        self.progress.reset().await?;
        self.reload().await
    }
}
