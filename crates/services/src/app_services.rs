use std::sync::Arc;

use course_core::UnlockPolicy;
use course_core::model::{CourseTree, CurriculumIndex};
use storage::repository::Storage;
use tracing::{info, warn};

use crate::Clock;
use crate::error::{AppServicesError, StorageUnavailable};
use crate::overview::CourseOverview;
use crate::progress_cache::ProgressCache;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;

/// Assembles app-facing services over one curriculum and one progress store.
#[derive(Clone)]
pub struct AppServices {
    tree: Arc<CourseTree>,
    order: Arc<CurriculumIndex>,
    cache: Arc<ProgressCache>,
    quiz: Arc<QuizService>,
    storage_warning: Option<StorageUnavailable>,
    durable: bool,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// If the database cannot be opened the session continues on an
    /// in-memory store and [`AppServices::storage_warning`] explains why.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the curriculum is malformed.
    pub async fn open(
        db_url: &str,
        clock: Clock,
        tree: CourseTree,
        policy: UnlockPolicy,
    ) -> Result<Self, AppServicesError> {
        let order = CurriculumIndex::from_tree(&tree)?;
        let (storage, storage_warning) = match Storage::sqlite(db_url).await {
            Ok(storage) => {
                info!(db_url, "opened progress storage");
                (storage, None)
            }
            Err(err) => {
                warn!(db_url, error = %err, "falling back to in-memory progress storage");
                let warning = StorageUnavailable {
                    reason: err.to_string(),
                };
                (Storage::in_memory(), Some(warning))
            }
        };
        Ok(Self::assemble(storage, clock, tree, order, policy, storage_warning).await)
    }

    /// Build services over a process-local store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the curriculum is malformed.
    pub async fn in_memory(
        clock: Clock,
        tree: CourseTree,
        policy: UnlockPolicy,
    ) -> Result<Self, AppServicesError> {
        let order = CurriculumIndex::from_tree(&tree)?;
        Ok(Self::assemble(Storage::in_memory(), clock, tree, order, policy, None).await)
    }

    async fn assemble(
        storage: Storage,
        clock: Clock,
        tree: CourseTree,
        order: CurriculumIndex,
        policy: UnlockPolicy,
        storage_warning: Option<StorageUnavailable>,
    ) -> Self {
        let tree = Arc::new(tree);
        let order = Arc::new(order);
        let progress = ProgressService::new(clock, Arc::clone(&storage.progress));
        let cache = Arc::new(ProgressCache::load(progress, policy).await);
        let quiz = Arc::new(QuizService::new(
            Arc::clone(&cache),
            Arc::clone(&tree),
            Arc::clone(&order),
        ));

        Self {
            tree,
            order,
            cache,
            quiz,
            storage_warning,
            durable: storage.is_durable(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> Arc<ProgressCache> {
        Arc::clone(&self.cache)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn tree(&self) -> &CourseTree {
        &self.tree
    }

    #[must_use]
    pub fn order(&self) -> &CurriculumIndex {
        &self.order
    }

    #[must_use]
    pub fn overview(&self) -> CourseOverview {
        self.cache.overview(&self.order)
    }

    /// Set when durable storage could not be opened.
    #[must_use]
    pub fn storage_warning(&self) -> Option<&StorageUnavailable> {
        self.storage_warning.as_ref()
    }

    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable
    }
}
