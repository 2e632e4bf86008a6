use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::models::{ExtractedRecord, PersistedRecord};
use crate::utils::error::Result;

/// Keeps records in memory. Useful for tests and dry runs; nothing survives
/// a restart.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<PersistedRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Stored records in insertion order.
    pub async fn records(&self) -> Vec<PersistedRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|record| record.url == url).cloned())
    }

    async fn save(&self, record: &ExtractedRecord) -> Result<PersistedRecord> {
        let persisted = PersistedRecord::new(record.clone());
        self.records.write().await.push(persisted.clone());
        Ok(persisted)
    }

    async fn list_for_page(&self, config_id: &str, limit: u32, offset: u32) -> Result<Vec<PersistedRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| record.source_config_id == config_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
