pub mod config;
pub mod document;
pub mod extraction;
pub mod models;
pub mod notifiers;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use extraction::{ExtractionEngine, ExtractionPipeline, RunGuard, RunReport, RunStatus};
pub use models::{ExtractedRecord, PersistedRecord, SearchPage};
pub use scheduler::SearchScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
