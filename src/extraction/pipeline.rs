use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::{Extraction, ExtractionEngine};
use super::guard::{GuardOutcome, RunGuard};
use crate::config::AppConfig;
use crate::document::{DocumentLoader, LoadOptions, PageFetcher};
use crate::models::{ExtractedRecord, PersistedRecord, SearchPage};
use crate::notifiers::{self, NotificationSink};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    /// Another run of the page held the guard; nothing was fetched.
    Busy,
    /// The page is switched off; nothing was fetched.
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveFailure {
    pub url: String,
    pub error: String,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub page: String,
    pub status: RunStatus,
    pub candidates: usize,
    pub extracted: usize,
    pub duplicates: usize,
    /// Records saved during this run, in document order.
    pub new_records: Vec<PersistedRecord>,
    pub failed_saves: Vec<SaveFailure>,
    pub notified: bool,
    pub notification_error: Option<String>,
    pub elapsed_ms: u64,
}

impl RunReport {
    fn new(page: &str, status: RunStatus) -> Self {
        Self {
            page: page.to_string(),
            status,
            candidates: 0,
            extracted: 0,
            duplicates: 0,
            new_records: Vec::new(),
            failed_saves: Vec::new(),
            notified: false,
            notification_error: None,
            elapsed_ms: 0,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.elapsed_ms = started.elapsed().as_millis() as u64;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.status == RunStatus::Busy
    }
}

/// Fetch, extract, dedup, persist and notify for one search page at a time.
pub struct ExtractionPipeline {
    loader: Arc<dyn DocumentLoader>,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn NotificationSink>,
    guard: RunGuard,
    guard_timeout: Duration,
    engine: ExtractionEngine,
}

impl ExtractionPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn NotificationSink>,
        guard_timeout: Duration,
    ) -> Self {
        Self {
            loader,
            store,
            notifier,
            guard: RunGuard::new(),
            guard_timeout,
            engine: ExtractionEngine::new(),
        }
    }

    /// Wires the SQLite store, the page fetcher and the configured notifier.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = SqliteRecordStore::from_config(&config.database).await?;
        let loader = PageFetcher::from_config(&config.scraper)?;
        let notifier = notifiers::from_config(&config.notifications.smtp)?;

        Ok(Self::new(
            Arc::new(loader),
            Arc::new(store),
            notifier,
            config.scraper.guard_timeout(),
        ))
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Runs one search page.
    ///
    /// Contention on the page is not an error: the report comes back with
    /// [`RunStatus::Busy`] and nothing is fetched. Invalid configuration,
    /// fetch failures and results locator failures abort the run.
    pub async fn run(&self, page: &SearchPage) -> Result<RunReport> {
        let started = Instant::now();
        page.ensure_valid()?;

        if !page.rules.enabled {
            tracing::debug!(page = %page.name, "Search page is disabled, skipping");
            return Ok(RunReport::new(&page.name, RunStatus::Disabled).finish(started));
        }

        let permit = match self.guard.try_acquire(&page.name, self.guard_timeout).await {
            GuardOutcome::Acquired(permit) => permit,
            GuardOutcome::Busy => {
                tracing::warn!(page = %page.name, "Cannot process, search page is being processed now");
                return Ok(RunReport::new(&page.name, RunStatus::Busy).finish(started));
            }
        };

        let result = self.run_guarded(page).await;
        permit.release();

        let report = result?.finish(started);
        tracing::info!(
            page = %page.name,
            candidates = report.candidates,
            extracted = report.extracted,
            duplicates = report.duplicates,
            new = report.new_records.len(),
            failed = report.failed_saves.len(),
            elapsed_ms = report.elapsed_ms,
            "Search page processed"
        );
        Ok(report)
    }

    async fn run_guarded(&self, page: &SearchPage) -> Result<RunReport> {
        let mut report = RunReport::new(&page.name, RunStatus::Completed);

        let extraction = self.fetch_and_extract(page).await?;
        report.candidates = extraction.candidates;
        report.extracted = extraction.records.len();

        let fresh = self.dedup(extraction.records, &mut report).await?;
        self.persist(&fresh, &mut report).await;
        self.notify(page, &mut report).await;

        Ok(report)
    }

    /// Loads the page and walks it on a blocking worker. The document is
    /// closed before the worker returns, whatever the extraction outcome.
    async fn fetch_and_extract(&self, page: &SearchPage) -> Result<Extraction> {
        let loader = Arc::clone(&self.loader);
        let engine = self.engine;
        let page = page.clone();

        tokio::task::spawn_blocking(move || {
            let options = LoadOptions {
                javascript_enabled: page.rules.javascript_required,
            };
            tracing::debug!(page = %page.name, url = %page.url, javascript = options.javascript_enabled, "Loading search page");

            let mut document = loader.load(&page.url, options)?;
            let extraction = engine.extract(document.as_ref(), &page);
            document.close();
            extraction
        })
        .await
        .map_err(|e| AppError::Internal(format!("extraction worker failed: {}", e)))?
    }

    async fn dedup(&self, records: Vec<ExtractedRecord>, report: &mut RunReport) -> Result<Vec<ExtractedRecord>> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for record in records {
            if !seen.insert(record.url.clone()) {
                report.duplicates += 1;
                continue;
            }

            if self.store.find_by_url(&record.url).await?.is_some() {
                tracing::trace!(url = %record.url, "Result already known");
                report.duplicates += 1;
                continue;
            }

            fresh.push(record);
        }

        Ok(fresh)
    }

    async fn persist(&self, records: &[ExtractedRecord], report: &mut RunReport) {
        for record in records {
            match self.store.save(record).await {
                Ok(saved) => report.new_records.push(saved),
                Err(e) => {
                    tracing::error!(page = %report.page, url = %record.url, "Failed to save result: {}", e);
                    report.failed_saves.push(SaveFailure {
                        url: record.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !report.failed_saves.is_empty() {
            tracing::warn!(
                page = %report.page,
                failed = report.failed_saves.len(),
                saved = report.new_records.len(),
                "Some results could not be saved"
            );
        }
    }

    async fn notify(&self, page: &SearchPage, report: &mut RunReport) {
        if report.new_records.is_empty() {
            tracing::debug!(page = %page.name, "No new results, nothing to send");
            return;
        }

        match self.notifier.notify(page, &report.new_records).await {
            Ok(()) => report.notified = true,
            Err(e) => {
                tracing::error!(page = %page.name, "Failed to send notification: {}", e);
                report.notification_error = Some(e.to_string());
            }
        }
    }
}
