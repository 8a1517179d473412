use async_trait::async_trait;
use course_core::model::{LessonId, LessonProgress, SCHEMA_VERSION};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored row that could not be turned back into a `LessonProgress`.
///
/// Rejections are per record: the rest of a scan still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub slug: String,
    pub reason: String,
}

/// Result of reading every record in the store.
#[derive(Debug, Clone, Default)]
pub struct ProgressScan {
    pub records: Vec<LessonProgress>,
    pub rejected: Vec<RejectedRecord>,
}

/// Durable key-value table of lesson progress, keyed by lesson slug.
///
/// Each call is atomic on its own; nothing orders calls made from different
/// call sites.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the stored row
    /// is not a valid record.
    async fn get(&self, id: &LessonId) -> Result<Option<LessonProgress>, StorageError>;

    /// Insert or overwrite the record for `progress.lesson_id()`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn put(&self, progress: &LessonProgress) -> Result<(), StorageError>;

    /// Read every record. Undecodable rows land in `ProgressScan::rejected`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read at all.
    async fn scan(&self) -> Result<ProgressScan, StorageError>;

    /// Upsert a batch of records in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; no record is written then.
    async fn replace_all(&self, records: &[LessonProgress]) -> Result<(), StorageError>;

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Schema version the store is currently at.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the version cannot be read.
    async fn schema_version(&self) -> Result<u32, StorageError>;
}

/// Simple in-memory store for tests and sessions without durable storage.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<LessonId, LessonProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn get(&self, id: &LessonId) -> Result<Option<LessonProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn put(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.lesson_id().clone(), progress.clone());
        Ok(())
    }

    async fn scan(&self) -> Result<ProgressScan, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<LessonProgress> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.lesson_id().cmp(b.lesson_id()));
        Ok(ProgressScan {
            records,
            rejected: Vec::new(),
        })
    }

    async fn replace_all(&self, records: &[LessonProgress]) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for record in records {
            guard.insert(record.lesson_id().clone(), record.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }

    async fn schema_version(&self) -> Result<u32, StorageError> {
        Ok(SCHEMA_VERSION)
    }
}

/// The progress store behind a trait object, plus whether it outlives the process.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressStore>,
    durable: bool,
}

impl Storage {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressStore>, durable: bool) -> Self {
        Self { progress, durable }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()), false)
    }

    /// False when progress will be lost at the end of the session.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable
    }
}
