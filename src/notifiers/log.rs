use async_trait::async_trait;

use super::{digest_subject, NotificationSink};
use crate::models::{PersistedRecord, SearchPage};
use crate::utils::error::Result;

/// Writes digests to the log instead of sending them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, page: &SearchPage, records: &[PersistedRecord]) -> Result<()> {
        tracing::info!(page = %page.name, count = records.len(), "{}", digest_subject(page, records));
        for record in records {
            tracing::info!(
                page = %page.name,
                title = record.title.as_deref().unwrap_or_default(),
                price = record.price.as_deref().unwrap_or_default(),
                "New result: {}",
                record.url
            );
        }
        Ok(())
    }
}
