#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod overview;
pub mod progress_cache;
pub mod progress_service;
pub mod quiz_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressServiceError, QuizServiceError, StorageUnavailable};
pub use overview::{CourseOverview, ModuleOverview};
pub use progress_cache::{CacheSnapshot, ListenerId, ProgressCache, ProgressListener};
pub use progress_service::{ProgressService, most_recently_accessed};
pub use quiz_service::QuizService;
