use super::*;
use search_watcher::store::RecordStore;
use search_watcher::{AppError, ExtractedRecord, RunStatus};

#[tokio::test(flavor = "multi_thread")]
async fn test_omitted_results_are_not_reported() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;
    let test = create_test_pipeline()?;

    let page = listing_page("sreality", &format!("{}/search?page=1", server.uri()));
    let report = test.pipeline.run(&page).await?;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.candidates, 3);
    assert_eq!(report.new_records.len(), 2);

    let first = &report.new_records[0];
    assert_eq!(first.source_config_id, "sreality");
    assert_eq!(first.title.as_deref(), Some("Family house"));
    assert_eq!(first.price.as_deref(), Some("4 500 000 CZK"));
    assert_eq!(first.description.as_deref(), Some("Budweis"));
    assert_eq!(first.url, format!("{}/detail/1", server.uri()));
    assert_eq!(first.image_url, Some(format!("{}/img/1.jpg", server.uri())));
    assert_eq!(report.new_records[1].title.as_deref(), Some("Cottage"));

    let batches = test.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_only_unknown_urls_are_notified() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;
    let test = create_test_pipeline()?;

    let known = format!("{}/detail/1", server.uri());
    test.store
        .save(&ExtractedRecord {
            source_config_id: "sreality".to_string(),
            title: Some("Family house".to_string()),
            price: None,
            description: None,
            url: known.clone(),
            image_url: None,
        })
        .await?;

    let page = listing_page("sreality", &format!("{}/search", server.uri()));
    let report = test.pipeline.run(&page).await?;

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.new_records.len(), 1);
    assert_eq!(report.new_records[0].url, format!("{}/detail/2", server.uri()));

    let batches = test.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_ne!(batches[0][0].url, known);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unchanged_page_yields_nothing_the_second_time() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;
    let test = create_test_pipeline()?;
    let page = listing_page("sreality", &format!("{}/search", server.uri()));

    let first = test.pipeline.run(&page).await?;
    let second = test.pipeline.run(&page).await?;

    assert_eq!(first.new_records.len(), 2);
    assert!(second.new_records.is_empty());
    assert_eq!(test.sink.batches().len(), 1);
    assert_eq!(test.store.len().await, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_result_without_link_is_dropped() -> anyhow::Result<()> {
    let html = r#"
        <div class="property">
            <h2><a>Price on request</a></h2>
            <span class="norm-price">on request</span>
            <span class="locality">Pisek</span>
        </div>
        <div class="property">
            <h2><a href="/detail/3">Farm</a></h2>
        </div>
    "#;
    let server = MockServer::start().await;
    mount_html(&server, "/search", html).await;
    let test = create_test_pipeline()?;

    let page = listing_page("sreality", &format!("{}/search", server.uri()));
    let report = test.pipeline.run(&page).await?;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.new_records.len(), 1);
    assert_eq!(report.new_records[0].title.as_deref(), Some("Farm"));
    assert!(report.new_records[0].price.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_fails_the_run_and_frees_the_page() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let test = create_test_pipeline()?;

    let page = listing_page("sreality", &format!("{}/search", server.uri()));
    let result = test.pipeline.run(&page).await;

    assert!(matches!(result, Err(AppError::Fetch { .. })));
    assert!(!test.pipeline.guard().is_busy("sreality").await);
    assert!(test.sink.batches().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_busy_page_returns_without_fetching() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .expect(0)
        .mount(&server)
        .await;
    let test = create_test_pipeline()?;
    let page = listing_page("A", &format!("{}/search", server.uri()));

    let _held = test.pipeline.guard().try_acquire("A", Duration::ZERO).await;
    let started = std::time::Instant::now();
    let report = test.pipeline.run(&page).await?;

    assert!(report.is_busy());
    assert!(report.new_records.is_empty());
    assert!(started.elapsed() < Duration::from_millis(1500));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overlapping_runs_of_one_page() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LISTING_HTML)
                .set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let test = create_test_pipeline()?;
    let page = listing_page("sreality", &format!("{}/search", server.uri()));

    let (a, b) = tokio::join!(test.pipeline.run(&page), test.pipeline.run(&page));
    let statuses = [a?.status, b?.status];

    assert!(statuses.contains(&RunStatus::Completed));
    assert!(statuses.contains(&RunStatus::Busy));
    assert!(!test.pipeline.guard().is_busy("sreality").await);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_links_resolve_against_the_final_address() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old-search"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/listings/search"))
        .mount(&server)
        .await;
    mount_html(&server, "/listings/search", r#"<div class="property"><h2><a href="detail/9">Villa</a></h2></div>"#).await;
    let test = create_test_pipeline()?;

    let page = listing_page("sreality", &format!("{}/old-search", server.uri()));
    let report = test.pipeline.run(&page).await?;

    assert_eq!(report.new_records[0].url, format!("{}/listings/detail/9", server.uri()));
    Ok(())
}
