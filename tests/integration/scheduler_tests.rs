use super::*;
use search_watcher::config::SchedulerConfig;
use search_watcher::scheduler::JobStatus;
use search_watcher::{AppError, SearchScheduler};

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        enabled: true,
        default_interval: "0 */5 * * * *".to_string(), // Every 5 minutes
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_all_now_runs_pages_independently() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/remax", LISTING_HTML).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let test = create_test_pipeline()?;
    let scheduler = SearchScheduler::new(Arc::clone(&test.pipeline), scheduler_config()).await?;
    let mut disabled = listing_page("century21", &format!("{}/century21", server.uri()));
    disabled.rules.enabled = false;
    let pages = vec![
        listing_page("remax", &format!("{}/remax", server.uri())),
        listing_page("broken", &format!("{}/broken", server.uri())),
        disabled,
    ];

    assert_eq!(scheduler.schedule_all(&pages).await?, 2);
    let outcomes = scheduler.run_all_now(&pages).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        match outcome.page.as_str() {
            "remax" => assert_eq!(outcome.result.as_ref().unwrap().new_records.len(), 2),
            "broken" => assert!(matches!(outcome.result, Err(AppError::Fetch { .. }))),
            other => panic!("unexpected page {}", other),
        }
    }

    let broken = scheduler.get_job_info("broken").await.unwrap();
    assert_eq!(broken.status, JobStatus::Error);
    assert_eq!(broken.error_count, 1);

    let remax = scheduler.get_job_info("remax").await.unwrap();
    assert_eq!(remax.status, JobStatus::Active);
    assert_eq!(remax.new_records_total, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_job_runs_the_pipeline() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;

    let test = create_test_pipeline()?;
    let mut scheduler = SearchScheduler::new(Arc::clone(&test.pipeline), scheduler_config()).await?;
    let mut page = listing_page("sreality", &format!("{}/search", server.uri()));
    page.check_interval = Some("* * * * * *".to_string()); // Every second

    scheduler.schedule_page(&page).await?;
    scheduler.start().await?;

    let mut runs = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        runs = scheduler.get_job_info("sreality").await.map_or(0, |job| job.run_count);
        if runs > 0 {
            break;
        }
    }
    scheduler.shutdown().await?;

    assert!(runs > 0, "scheduled job never ran");
    assert_eq!(test.store.len().await, 2);
    assert_eq!(test.sink.batches().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_scheduler_stats() -> anyhow::Result<()> {
    let test = create_test_pipeline()?;
    let scheduler = SearchScheduler::new(Arc::clone(&test.pipeline), scheduler_config()).await?;

    scheduler.schedule_page(&listing_page("remax", "http://localhost:1/remax")).await?;
    scheduler.schedule_page(&listing_page("century21", "http://localhost:1/century21")).await?;

    let stats = scheduler.get_stats().await;
    assert_eq!(stats.total_jobs, 2);
    assert_eq!(stats.active_jobs, 2);
    assert_eq!(stats.completed_runs, 0);
    assert_eq!(stats.failed_runs, 0);
    Ok(())
}
