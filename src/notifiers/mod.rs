pub mod email;
pub mod log;

pub use email::EmailNotifier;
pub use log::LogNotifier;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::models::{PersistedRecord, SearchPage};
use crate::utils::error::Result;

/// Receives the records that were new in a run.
///
/// Never called with an empty slice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, page: &SearchPage, records: &[PersistedRecord]) -> Result<()>;
}

/// Email when SMTP has a recipient, the log otherwise.
pub fn from_config(smtp: &SmtpConfig) -> Result<Arc<dyn NotificationSink>> {
    if smtp.is_configured() {
        tracing::info!(host = %smtp.host, "Sending digests by email");
        Ok(Arc::new(EmailNotifier::new(smtp)?))
    } else {
        tracing::info!("SMTP recipient not configured, digests go to the log");
        Ok(Arc::new(LogNotifier::new()))
    }
}

/// Subject line of a digest.
pub fn digest_subject(page: &SearchPage, records: &[PersistedRecord]) -> String {
    match records {
        [only] => format!(
            "{}, {}",
            only.title.as_deref().unwrap_or_default(),
            only.price.as_deref().unwrap_or_default()
        ),
        _ => format!("Found {} new results on {}", records.len(), page.name),
    }
}
