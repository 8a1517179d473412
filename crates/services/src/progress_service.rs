use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{
    LessonId, LessonProgress, LessonState, ProgressEvent, ProgressSnapshot,
};
use storage::repository::{InMemoryRepository, ProgressScan, ProgressStore, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Pick the record touched most recently.
///
/// Ties on `last_accessed_at` go to the lexicographically smallest slug.
pub fn most_recently_accessed<'a, I>(records: I) -> Option<&'a LessonProgress>
where
    I: IntoIterator<Item = &'a LessonProgress>,
{
    records.into_iter().max_by(|a, b| {
        a.last_accessed_at()
            .cmp(&b.last_accessed_at())
            .then_with(|| b.lesson_id().cmp(a.lesson_id()))
    })
}

/// Typed progress operations over a `ProgressStore`.
///
/// Every mutation is read-modify-write on a single record; the transition
/// rules themselves live on `LessonProgress`.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: Arc<dyn ProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn ProgressStore>) -> Self {
        Self { clock, store }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(clock, Arc::new(InMemoryRepository::new()))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record that the learner opened a lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read or write fails.
    pub async fn mark_viewed(&self, id: &LessonId) -> Result<LessonProgress, ProgressServiceError> {
        self.record(id, ProgressEvent::Viewed).await
    }

    /// Record that the learner finished a lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read or write fails.
    pub async fn mark_completed(
        &self,
        id: &LessonId,
    ) -> Result<LessonProgress, ProgressServiceError> {
        self.record(id, ProgressEvent::Completed).await
    }

    /// Record a passed quiz. Failed attempts are never passed to this.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read or write fails.
    pub async fn mark_quiz_passed(
        &self,
        id: &LessonId,
    ) -> Result<LessonProgress, ProgressServiceError> {
        self.record(id, ProgressEvent::QuizPassed).await
    }

    async fn record(
        &self,
        id: &LessonId,
        event: ProgressEvent,
    ) -> Result<LessonProgress, ProgressServiceError> {
        let now = self.clock.now();
        // An unreadable row is overwritten by the fresh record below.
        let existing = match self.store.get(id).await {
            Ok(existing) => existing,
            Err(StorageError::Serialization(reason)) => {
                warn!(slug = %id, %reason, "replacing unreadable progress record");
                None
            }
            Err(err) => return Err(err.into()),
        };
        let updated = LessonProgress::apply(existing, id, event, now);
        self.store.put(&updated).await?;
        debug!(slug = %id, %event, status = %updated.status(), "recorded lesson progress");
        Ok(updated)
    }

    /// Fetch one record; `None` means the lesson was never touched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn get_progress(
        &self,
        id: &LessonId,
    ) -> Result<Option<LessonProgress>, ProgressServiceError> {
        Ok(self.store.get(id).await?)
    }

    /// Like `get_progress`, with untouched lessons reported as not started.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn get_state(&self, id: &LessonId) -> Result<LessonState, ProgressServiceError> {
        Ok(self
            .store
            .get(id)
            .await?
            .map(|p| p.state())
            .unwrap_or_default())
    }

    /// Read every record, including the rows that had to be rejected.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn load_all(&self) -> Result<ProgressScan, ProgressServiceError> {
        let scan = self.store.scan().await?;
        if !scan.rejected.is_empty() {
            warn!(
                rejected = scan.rejected.len(),
                loaded = scan.records.len(),
                "some progress records could not be read"
            );
        }
        Ok(scan)
    }

    /// Full slug → record mapping.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn get_all_progress(
        &self,
    ) -> Result<BTreeMap<LessonId, LessonProgress>, ProgressServiceError> {
        let scan = self.load_all().await?;
        Ok(scan
            .records
            .into_iter()
            .map(|record| (record.lesson_id().clone(), record))
            .collect())
    }

    /// The most recently touched record, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn get_last_accessed(&self) -> Result<Option<LessonProgress>, ProgressServiceError> {
        let scan = self.load_all().await?;
        Ok(most_recently_accessed(&scan.records).cloned())
    }

    /// Export every readable record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn export_snapshot(&self) -> Result<ProgressSnapshot, ProgressServiceError> {
        let scan = self.load_all().await?;
        Ok(ProgressSnapshot::new(scan.records, self.clock.now()))
    }

    /// Apply an exported document, overwriting the records it contains.
    ///
    /// Nothing is written unless the whole document is valid. Returns the
    /// number of records written.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Snapshot` for an invalid document and
    /// `ProgressServiceError::Storage` if the batch write fails.
    pub async fn import_snapshot(
        &self,
        snapshot: ProgressSnapshot,
    ) -> Result<usize, ProgressServiceError> {
        snapshot.validate()?;
        let records = snapshot.into_records();
        self.store.replace_all(&records).await?;
        info!(records = records.len(), "imported progress snapshot");
        Ok(records.len())
    }

    /// Forget all progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the delete fails.
    pub async fn reset(&self) -> Result<(), ProgressServiceError> {
        self.store.clear().await?;
        info!("reset all lesson progress");
        Ok(())
    }

    /// Schema version of the underlying store.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if it cannot be read.
    pub async fn schema_version(&self) -> Result<u32, ProgressServiceError> {
        Ok(self.store.schema_version().await?)
    }
}
