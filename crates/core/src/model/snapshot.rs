use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::progress::LessonProgress;

/// Version of the progress schema written by this build.
///
/// Exports carry it, imports reject anything newer, and the storage
/// migrations end at it.
pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found} (this build reads 1..={supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("snapshot key {key} holds the record for {slug}")]
    KeyMismatch { key: LessonId, slug: LessonId },
}

/// Export/import document for the whole progress map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub lessons: BTreeMap<LessonId, LessonProgress>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
    pub version: u32,
}

impl ProgressSnapshot {
    /// Snapshot the given records at the current schema version.
    #[must_use]
    pub fn new(
        records: impl IntoIterator<Item = LessonProgress>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let lessons = records
            .into_iter()
            .map(|record| (record.lesson_id().clone(), record))
            .collect();
        Self {
            lessons,
            exported_at,
            version: SCHEMA_VERSION,
        }
    }

    /// Check the document before any of it is applied.
    ///
    /// Per-record invariants are already enforced while deserializing
    /// `LessonProgress`; this covers the document-level rules.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` for an unknown version or a map key that does
    /// not match its record.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version == 0 || self.version > SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SCHEMA_VERSION,
            });
        }
        for (key, record) in &self.lessons {
            if key != record.lesson_id() {
                return Err(SnapshotError::KeyMismatch {
                    key: key.clone(),
                    slug: record.lesson_id().clone(),
                });
            }
        }
        Ok(())
    }

    /// Consume the snapshot, yielding its records in slug order.
    #[must_use]
    pub fn into_records(self) -> Vec<LessonProgress> {
        self.lessons.into_values().collect()
    }
}
