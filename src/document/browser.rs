use anyhow::anyhow;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;

use super::{collapse_whitespace, DocumentElement, DocumentLoader, LoadOptions, QueryableDocument};
use crate::config::ScraperConfig;
use crate::models::{Locator, SelectorType};
use crate::utils::error::{AppError, Result};

/// Renders pages in headless Chrome, one tab per load.
pub struct BrowserDocumentLoader {
    browser: Browser,
    user_agent: String,
    timeout: Duration,
}

impl BrowserDocumentLoader {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Internal(format!("Failed to launch browser: {}", e)))?;

        Ok(Self {
            browser,
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout),
        })
    }

    fn open(&self, url: &str) -> anyhow::Result<Arc<Tab>> {
        let tab = self.browser.new_tab()?;
        tab.set_default_timeout(self.timeout);

        let navigated = tab
            .set_user_agent(&self.user_agent, None, None)
            .and_then(|_| tab.navigate_to(url))
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());

        if let Err(e) = navigated {
            // Don't leak the tab of a page that never loaded
            let _ = tab.close(true);
            return Err(anyhow!("Navigation failed: {}", e));
        }

        Ok(tab)
    }
}

impl DocumentLoader for BrowserDocumentLoader {
    fn load(&self, url: &str, _options: LoadOptions) -> Result<Box<dyn QueryableDocument>> {
        let tab = self.open(url).map_err(|e| AppError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let final_url = match tab.get_url() {
            current if current.is_empty() => url.to_string(),
            current => current,
        };

        Ok(Box::new(BrowserDocument {
            url: final_url,
            tab: Some(tab),
        }))
    }
}

/// A page rendered in a browser tab. The tab is closed on `close` or drop.
pub struct BrowserDocument {
    url: String,
    tab: Option<Arc<Tab>>,
}

impl QueryableDocument for BrowserDocument {
    fn url(&self) -> &str {
        &self.url
    }

    fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Box<dyn DocumentElement + '_>>> {
        let tab = self
            .tab
            .as_ref()
            .ok_or_else(|| AppError::Internal(format!("document {} is closed", self.url)))?;

        let found = match locator.kind {
            SelectorType::Css => tab.find_elements(locator.expression),
            SelectorType::Xpath => tab.find_elements_by_xpath(locator.expression),
        };

        Ok(matched_elements(locator, found)?
            .into_iter()
            .map(|element| Box::new(BrowserElement(element)) as Box<dyn DocumentElement + '_>)
            .collect())
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(true) {
                tracing::warn!(url = %self.url, "Exception when closing browser tab: {}", e);
            }
        }
    }
}

impl Drop for BrowserDocument {
    fn drop(&mut self) {
        self.close();
    }
}

/// An empty result page is not an error; any other lookup failure is.
fn matched_elements<T>(locator: Locator<'_>, found: anyhow::Result<Vec<T>>) -> Result<Vec<T>> {
    match found {
        Ok(elements) => Ok(elements),
        Err(e) if e.downcast_ref::<NoElementFound>().is_some() => Ok(Vec::new()),
        Err(e) => Err(AppError::Locator {
            locator: locator.to_string(),
            message: e.to_string(),
        }),
    }
}

struct BrowserElement<'a>(Element<'a>);

impl DocumentElement for BrowserElement<'_> {
    fn find(&self, locator: Locator<'_>) -> Result<Box<dyn DocumentElement + '_>> {
        let found = match locator.kind {
            SelectorType::Css => self.0.find_element(locator.expression),
            SelectorType::Xpath => self.0.find_element_by_xpath(locator.expression),
        };

        found
            .map(|element| Box::new(BrowserElement(element)) as Box<dyn DocumentElement + '_>)
            .map_err(|_| AppError::ElementNotFound {
                selector: locator.to_string(),
            })
    }

    fn text(&self) -> Result<String> {
        self.0
            .get_inner_text()
            .map(|text| collapse_whitespace(&text))
            .map_err(|e| AppError::Internal(format!("Failed to read element text: {}", e)))
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.0
            .get_attribute_value(name)
            .map_err(|e| AppError::Internal(format!("Failed to read attribute '{}': {}", name, e)))
    }
}
