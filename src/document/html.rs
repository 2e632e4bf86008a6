use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tokio::runtime::Handle;

use super::{collapse_whitespace, DocumentElement, DocumentLoader, LoadOptions, QueryableDocument};
use crate::config::ScraperConfig;
use crate::models::{Locator, SelectorType};
use crate::utils::error::{AppError, Result};

/// A page parsed from static HTML. Only CSS locators can be evaluated.
pub struct HtmlDocument {
    url: String,
    html: Option<Html>,
}

impl HtmlDocument {
    pub fn parse(url: impl Into<String>, source: &str) -> Self {
        Self {
            url: url.into(),
            html: Some(Html::parse_document(source)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.html.is_none()
    }
}

impl QueryableDocument for HtmlDocument {
    fn url(&self) -> &str {
        &self.url
    }

    fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Box<dyn DocumentElement + '_>>> {
        let html = self
            .html
            .as_ref()
            .ok_or_else(|| AppError::Internal(format!("document {} is closed", self.url)))?;
        let selector = css_selector(locator)?;

        Ok(html
            .select(&selector)
            .map(|element| Box::new(HtmlElement(element)) as Box<dyn DocumentElement + '_>)
            .collect())
    }

    fn close(&mut self) {
        self.html = None;
    }
}

struct HtmlElement<'a>(ElementRef<'a>);

impl DocumentElement for HtmlElement<'_> {
    fn find(&self, locator: Locator<'_>) -> Result<Box<dyn DocumentElement + '_>> {
        let selector = css_selector(locator)?;
        self.0
            .select(&selector)
            .next()
            .map(|element| Box::new(HtmlElement(element)) as Box<dyn DocumentElement + '_>)
            .ok_or_else(|| AppError::ElementNotFound {
                selector: locator.to_string(),
            })
    }

    fn text(&self) -> Result<String> {
        Ok(collapse_whitespace(&self.0.text().collect::<String>()))
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.value().attr(name).map(str::to_string))
    }
}

fn css_selector(locator: Locator<'_>) -> Result<Selector> {
    match locator.kind {
        SelectorType::Css => Selector::parse(locator.expression).map_err(|e| AppError::Locator {
            locator: locator.to_string(),
            message: format!("invalid CSS selector: {:?}", e),
        }),
        SelectorType::Xpath => Err(AppError::Locator {
            locator: locator.to_string(),
            message: "XPath locators need a rendered page (javascript_required = true)".to_string(),
        }),
    }
}

/// Fetches pages over plain HTTP without running scripts.
///
/// `load` blocks on the runtime captured at construction, so it must be
/// called from a blocking worker thread, never from async code.
pub struct HttpDocumentLoader {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpDocumentLoader {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Internal(format!("HTTP loader needs a tokio runtime: {}", e)))?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self { client, runtime })
    }

    async fn fetch(&self, url: &str) -> Result<(String, String)> {
        let fetch_error = |message: String| AppError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        // Links are resolved against the address we ended up at
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok((final_url, body))
    }
}

impl DocumentLoader for HttpDocumentLoader {
    fn load(&self, url: &str, _options: LoadOptions) -> Result<Box<dyn QueryableDocument>> {
        let (final_url, body) = self.runtime.block_on(self.fetch(url))?;
        tracing::trace!(url = %final_url, bytes = body.len(), "Page fetched");
        Ok(Box::new(HtmlDocument::parse(final_url, &body)))
    }
}
