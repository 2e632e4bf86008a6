//! Loaded pages and the elements inside them.
//!
//! Everything here is synchronous: loading a page and walking it are
//! blocking operations (network, browser round trips), so callers run them
//! on a blocking worker thread.

pub mod browser;
pub mod html;

pub use browser::{BrowserDocument, BrowserDocumentLoader};
pub use html::{HtmlDocument, HttpDocumentLoader};

use crate::config::ScraperConfig;
use crate::models::Locator;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub javascript_enabled: bool,
}

/// An element found inside a document.
pub trait DocumentElement {
    /// First element matching `locator` below this one.
    fn find(&self, locator: Locator<'_>) -> Result<Box<dyn DocumentElement + '_>>;

    /// Text content with whitespace collapsed.
    fn text(&self) -> Result<String>;

    fn attribute(&self, name: &str) -> Result<Option<String>>;
}

/// A loaded page that can be queried with locators.
pub trait QueryableDocument {
    /// Address the document was loaded from.
    fn url(&self) -> &str;

    /// All elements matching `locator`, in document order.
    fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Box<dyn DocumentElement + '_>>>;

    /// Releases whatever backs the document. Calling it again is a no-op.
    fn close(&mut self);
}

pub trait DocumentLoader: Send + Sync {
    fn load(&self, url: &str, options: LoadOptions) -> Result<Box<dyn QueryableDocument>>;
}

/// Sends pages that need JavaScript to the browser and the rest over plain HTTP.
pub struct PageFetcher {
    http: HttpDocumentLoader,
    browser: Option<BrowserDocumentLoader>,
}

impl PageFetcher {
    pub fn new(http: HttpDocumentLoader, browser: Option<BrowserDocumentLoader>) -> Self {
        Self { http, browser }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let http = HttpDocumentLoader::new(config)?;
        let browser = if config.browser_enabled {
            Some(BrowserDocumentLoader::new(config)?)
        } else {
            None
        };
        Ok(Self::new(http, browser))
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }
}

impl DocumentLoader for PageFetcher {
    fn load(&self, url: &str, options: LoadOptions) -> Result<Box<dyn QueryableDocument>> {
        if !options.javascript_enabled {
            return self.http.load(url, options);
        }

        match &self.browser {
            Some(browser) => browser.load(url, options),
            None => Err(AppError::Fetch {
                url: url.to_string(),
                message: "page requires JavaScript but the browser is disabled".to_string(),
            }),
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
