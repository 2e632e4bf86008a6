use super::*;
use search_watcher::document::{DocumentLoader, LoadOptions, PageFetcher, QueryableDocument};
use search_watcher::models::Locator;
use search_watcher::AppError;
use wiremock::matchers::header;

const STATIC: LoadOptions = LoadOptions {
    javascript_enabled: false,
};

fn css(expression: &str) -> Locator<'_> {
    Locator {
        kind: SelectorType::Css,
        expression,
    }
}

/// Loads `url` on a blocking worker and hands the document to `inspect`.
async fn with_document<T, F>(url: String, options: LoadOptions, inspect: F) -> search_watcher::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn QueryableDocument) -> search_watcher::Result<T> + Send + 'static,
{
    let loader = PageFetcher::from_config(&test_scraper_config())?;
    tokio::task::spawn_blocking(move || {
        let mut document = loader.load(&url, options)?;
        let value = inspect(document.as_ref());
        document.close();
        document.close();
        value
    })
    .await
    .expect("loader thread panicked")
}

async fn load(url: String, options: LoadOptions) -> search_watcher::Result<()> {
    with_document(url, options, |_| Ok(())).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_static_page_can_be_queried() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;

    let (url, count, classes, title, href, missing_attr, missing_element) =
        with_document(format!("{}/search", server.uri()), STATIC, |document| {
            let results = document.find_all(css("div.property"))?;
            let title = results[0].find(css("h2 a"))?;
            Ok((
                document.url().to_string(),
                results.len(),
                results[1].attribute("class")?,
                title.text()?,
                title.attribute("href")?,
                title.attribute("data-id")?,
                matches!(results[0].find(css(".missing")), Err(AppError::ElementNotFound { .. })),
            ))
        })
        .await?;

    assert_eq!(url, format!("{}/search", server.uri()));
    assert_eq!(count, 3);
    assert_eq!(classes.as_deref(), Some("property topovana"));
    assert_eq!(title, "Family house");
    assert_eq!(href.as_deref(), Some("/detail/1"));
    assert_eq!(missing_attr, None);
    assert!(missing_element);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_text_is_whitespace_collapsed() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", "<p class=\"d\">\n  Quiet   street,\n\t garden  </p>").await;

    let text = with_document(format!("{}/search", server.uri()), STATIC, |document| {
        document.find_all(css("p.d"))?[0].text()
    })
    .await?;

    assert_eq!(text, "Quiet street, garden");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configured_user_agent_is_sent() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("user-agent", "SearchWatcher-Test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    load(format!("{}/search", server.uri()), STATIC).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_found_is_a_fetch_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    match load(format!("{}/missing", server.uri()), STATIC).await {
        Err(AppError::Fetch { url, message }) => {
            assert!(url.ends_with("/missing"));
            assert!(message.contains("404"));
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(()) => panic!("missing page loaded"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_xpath_needs_a_browser() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;

    let rejected = with_document(format!("{}/search", server.uri()), STATIC, |document| {
        let xpath = Locator {
            kind: SelectorType::Xpath,
            expression: "//div[@class='property']",
        };
        Ok(matches!(document.find_all(xpath), Err(AppError::Locator { .. })))
    })
    .await?;

    assert!(rejected);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_javascript_page_without_browser_is_a_fetch_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_html(&server, "/search", LISTING_HTML).await;

    let options = LoadOptions {
        javascript_enabled: true,
    };
    let result = load(format!("{}/search", server.uri()), options).await;

    assert!(matches!(result, Err(AppError::Fetch { .. })));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_host_is_a_fetch_error() -> anyhow::Result<()> {
    let result = load("http://127.0.0.1:9/search".to_string(), STATIC).await;

    assert!(matches!(result, Err(AppError::Fetch { .. })));
    Ok(())
}
