use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{is_valid_cron, SchedulerConfig};
use crate::extraction::{ExtractionPipeline, RunReport, RunStatus};
use crate::models::SearchPage;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub page_name: String,
    pub cron_expression: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub busy_count: u64,
    pub error_count: u64,
    pub new_records_total: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub failing_jobs: usize,
    pub completed_runs: u64,
    pub busy_runs: u64,
    pub failed_runs: u64,
    pub new_records_total: u64,
    pub uptime_seconds: u64,
}

/// Outcome of one page in [`SearchScheduler::run_all_now`].
#[derive(Debug)]
pub struct PageOutcome {
    pub page: String,
    pub result: Result<RunReport>,
}

/// Triggers pipeline runs for search pages on their cron schedules.
pub struct SearchScheduler {
    scheduler: JobScheduler,
    pipeline: Arc<ExtractionPipeline>,
    jobs: Arc<RwLock<HashMap<String, JobInfo>>>, // page name -> JobInfo
    config: SchedulerConfig,
    start_time: DateTime<Utc>,
}

impl SearchScheduler {
    pub async fn new(pipeline: Arc<ExtractionPipeline>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            pipeline,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            config,
            start_time: Utc::now(),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.scheduler.start().await?;
        tracing::info!("Search scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Search scheduler shutdown");
        Ok(())
    }

    /// Schedules every enabled page, returning how many were scheduled.
    pub async fn schedule_all(&self, pages: &[SearchPage]) -> Result<usize> {
        let mut scheduled = 0;
        for page in pages.iter().filter(|page| page.rules.enabled) {
            self.schedule_page(page).await?;
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Schedule a page on its own interval, or the default one.
    pub async fn schedule_page(&self, page: &SearchPage) -> Result<()> {
        if !page.rules.enabled {
            return Err(AppError::Scheduler(format!("Cannot schedule disabled search page {}", page.name)));
        }
        page.ensure_valid()?;

        let cron_expression = page
            .check_interval
            .clone()
            .unwrap_or_else(|| self.config.default_interval.clone());
        if !is_valid_cron(&cron_expression) {
            return Err(AppError::Scheduler(format!(
                "Invalid cron expression '{}' for search page {}",
                cron_expression, page.name
            )));
        }

        // Remove existing job if any
        self.unschedule_page(&page.name).await?;

        let pipeline = Arc::clone(&self.pipeline);
        let jobs = Arc::clone(&self.jobs);
        let page_for_job = page.clone();

        let job = Job::new_async(cron_expression.as_str(), move |_uuid, _l| {
            let pipeline = Arc::clone(&pipeline);
            let jobs = Arc::clone(&jobs);
            let page = page_for_job.clone();

            Box::pin(async move {
                Self::execute_page_run(pipeline, jobs, &page).await;
            })
        })?;

        let job_id = self.scheduler.add(job).await?;

        let job_info = JobInfo {
            id: job_id,
            page_name: page.name.clone(),
            cron_expression: cron_expression.clone(),
            status: JobStatus::Active,
            created_at: Utc::now(),
            last_run: None,
            run_count: 0,
            success_count: 0,
            busy_count: 0,
            error_count: 0,
            new_records_total: 0,
            last_error: None,
        };

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(page.name.clone(), job_info);
        }

        tracing::info!(page = %page.name, cron = %cron_expression, "Scheduled search page");
        Ok(())
    }

    pub async fn unschedule_page(&self, page_name: &str) -> Result<()> {
        let removed = {
            let mut jobs = self.jobs.write().await;
            jobs.remove(page_name)
        };

        if let Some(job_info) = removed {
            self.scheduler.remove(&job_info.id).await?;
            tracing::info!(page = %page_name, job = %job_info.id, "Unscheduled search page");
        }

        Ok(())
    }

    pub async fn get_job_info(&self, page_name: &str) -> Option<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.get(page_name).cloned()
    }

    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.values().cloned().collect()
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let jobs = self.jobs.read().await;
        let uptime = Utc::now().signed_duration_since(self.start_time);

        SchedulerStats {
            total_jobs: jobs.len(),
            active_jobs: jobs.values().filter(|j| j.status == JobStatus::Active).count(),
            failing_jobs: jobs.values().filter(|j| j.status == JobStatus::Error).count(),
            completed_runs: jobs.values().map(|j| j.success_count).sum(),
            busy_runs: jobs.values().map(|j| j.busy_count).sum(),
            failed_runs: jobs.values().map(|j| j.error_count).sum(),
            new_records_total: jobs.values().map(|j| j.new_records_total).sum(),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
        }
    }

    /// Runs a page immediately, outside of its schedule.
    pub async fn run_now(&self, page: &SearchPage) -> Result<RunReport> {
        tracing::info!(page = %page.name, "Running immediate check");

        let result = self.pipeline.run(page).await;
        Self::update_job_stats(&self.jobs, &page.name, &result).await;
        result
    }

    /// Runs every enabled page once, pages in parallel. A failing page does
    /// not affect the others.
    pub async fn run_all_now(&self, pages: &[SearchPage]) -> Vec<PageOutcome> {
        let runs = pages
            .iter()
            .filter(|page| page.rules.enabled)
            .map(|page| async move {
                PageOutcome {
                    page: page.name.clone(),
                    result: self.run_now(page).await,
                }
            });

        join_all(runs).await
    }

    async fn execute_page_run(
        pipeline: Arc<ExtractionPipeline>,
        jobs: Arc<RwLock<HashMap<String, JobInfo>>>,
        page: &SearchPage,
    ) {
        tracing::debug!(page = %page.name, "Starting scheduled run");

        let result = pipeline.run(page).await;
        if let Err(e) = &result {
            tracing::error!(page = %page.name, "Scheduled run failed: {}", e);
        }

        Self::update_job_stats(&jobs, &page.name, &result).await;
    }

    async fn update_job_stats(
        jobs: &RwLock<HashMap<String, JobInfo>>,
        page_name: &str,
        result: &Result<RunReport>,
    ) {
        let mut jobs = jobs.write().await;
        let Some(job_info) = jobs.get_mut(page_name) else {
            return;
        };

        job_info.last_run = Some(Utc::now());
        job_info.run_count += 1;

        match result {
            Ok(report) if report.status == RunStatus::Busy => {
                job_info.busy_count += 1;
            }
            Ok(report) => {
                job_info.success_count += 1;
                job_info.new_records_total += report.new_records.len() as u64;
                job_info.last_error = None;
                job_info.status = JobStatus::Active;
            }
            Err(e) => {
                job_info.error_count += 1;
                job_info.last_error = Some(e.to_string());
                job_info.status = JobStatus::Error;
            }
        }
    }
}
