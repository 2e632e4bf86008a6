use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Result of asking the guard for a run slot.
#[derive(Debug)]
pub enum GuardOutcome {
    Acquired(RunPermit),
    /// Another run of the same page held the slot for the whole wait.
    Busy,
}

/// Exclusive right to run one search page. Dropping it frees the slot.
#[derive(Debug)]
pub struct RunPermit {
    config_id: String,
    _slot: OwnedMutexGuard<()>,
}

impl RunPermit {
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        tracing::trace!(page = %self.config_id, "Run guard released");
    }
}

/// Serializes runs per search page while letting different pages run in
/// parallel.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, config_id: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(config_id.to_string()).or_default())
    }

    /// Waits up to `timeout` for the page's slot.
    pub async fn try_acquire(&self, config_id: &str, timeout: Duration) -> GuardOutcome {
        let slot = self.slot(config_id).await;

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(page = %config_id, "Run guard acquired");
                GuardOutcome::Acquired(RunPermit {
                    config_id: config_id.to_string(),
                    _slot: guard,
                })
            }
            Err(_) => GuardOutcome::Busy,
        }
    }

    /// True while some run holds the page's slot.
    pub async fn is_busy(&self, config_id: &str) -> bool {
        self.slot(config_id).await.try_lock().is_err()
    }
}
