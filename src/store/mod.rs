//! Storage of extracted records.
//!
//! The pipeline only needs two things from a store: whether a URL has been
//! seen before, and a way to remember a new record.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;

use crate::models::{ExtractedRecord, PersistedRecord};
use crate::utils::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Any stored record with exactly this URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedRecord>>;

    async fn save(&self, record: &ExtractedRecord) -> Result<PersistedRecord>;

    /// Records of one search page, newest first.
    async fn list_for_page(&self, config_id: &str, limit: u32, offset: u32) -> Result<Vec<PersistedRecord>>;
}
