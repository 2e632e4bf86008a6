use serde::Serialize;
use url::Url;

use crate::document::{DocumentElement, QueryableDocument};
use crate::models::{ExtractedRecord, LocatorRuleSet, SearchPage};
use crate::utils::error::Result;

/// Records found on one page plus what happened to the other candidates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub records: Vec<ExtractedRecord>,
    /// Elements matched by the results locator.
    pub candidates: usize,
    /// Candidates skipped because of an omitted class.
    pub omitted: usize,
    /// Candidates dropped because no URL could be read.
    pub missing_url: usize,
    /// Field locators that failed to resolve.
    pub field_warnings: usize,
}

/// Walks a document with a page's locator rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionEngine;

impl ExtractionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Extracts records in document order.
    ///
    /// Only a failure of the results locator is an error. Field locators
    /// that don't resolve leave the field empty; candidates with an omitted
    /// class or without a URL are skipped.
    pub fn extract(&self, document: &dyn QueryableDocument, page: &SearchPage) -> Result<Extraction> {
        let rules = &page.rules;
        let mut extraction = Extraction::default();

        if !rules.enabled {
            tracing::debug!(page = %page.name, "Search page is disabled, nothing to extract");
            return Ok(extraction);
        }

        let Some(results_locator) = rules.results_locator() else {
            tracing::warn!(page = %page.name, "Search page has no results locator");
            return Ok(extraction);
        };

        let candidates = document.find_all(results_locator)?;
        extraction.candidates = candidates.len();
        tracing::info!(page = %page.name, candidates = candidates.len(), "Number of results found");

        for candidate in &candidates {
            if self.should_be_omitted(candidate.as_ref(), rules) {
                extraction.omitted += 1;
                continue;
            }

            let mut fields = FieldReader {
                element: candidate.as_ref(),
                rules,
                page: &page.name,
                warnings: 0,
            };

            let title = fields.text(rules.title.as_deref());
            let price = fields.text(rules.price.as_deref());
            let description = fields.text(rules.description.as_deref());
            let url = fields
                .attribute(rules.url.as_deref(), &rules.url_attribute)
                .and_then(|raw| resolve_link(document.url(), &raw));
            let image_url = fields
                .attribute(rules.image.as_deref(), &rules.image_attribute)
                .and_then(|raw| resolve_link(document.url(), &raw));
            extraction.field_warnings += fields.warnings;

            let Some(url) = url else {
                tracing::info!(page = %page.name, title = ?title, "Result skipped due to the empty url");
                extraction.missing_url += 1;
                continue;
            };

            let record = ExtractedRecord {
                source_config_id: page.name.clone(),
                title,
                price,
                description,
                url,
                image_url,
            };
            tracing::debug!(page = %page.name, "Found result: {}", record);
            extraction.records.push(record);
        }

        Ok(extraction)
    }

    fn should_be_omitted(&self, element: &dyn DocumentElement, rules: &LocatorRuleSet) -> bool {
        if rules.omit_classes.is_empty() {
            return false;
        }

        let classes = match element.attribute("class") {
            Ok(Some(classes)) => classes,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Cannot read class attribute of a result: {}", e);
                return false;
            }
        };

        let omitted = rules.omits(&classes);
        if omitted {
            tracing::debug!(classes = %classes, "Result omitted due to an omitted class");
        }
        omitted
    }
}

struct FieldReader<'a> {
    element: &'a dyn DocumentElement,
    rules: &'a LocatorRuleSet,
    page: &'a str,
    warnings: usize,
}

impl FieldReader<'_> {
    fn text(&mut self, expression: Option<&str>) -> Option<String> {
        self.read(expression, |element| element.text())
    }

    fn attribute(&mut self, expression: Option<&str>, name: &str) -> Option<String> {
        self.read(expression, |element| element.attribute(name).map(Option::unwrap_or_default))
    }

    fn read<F>(&mut self, expression: Option<&str>, value_of: F) -> Option<String>
    where
        F: FnOnce(&dyn DocumentElement) -> Result<String>,
    {
        let locator = self.rules.locator(expression?);
        let value = self
            .element
            .find(locator)
            .and_then(|found| value_of(found.as_ref()));

        match value {
            Ok(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(page = %self.page, locator = %locator, "Locator cannot be resolved in result: {}", e);
                self.warnings += 1;
                None
            }
        }
    }
}

/// Makes a link absolute against the page it was found on.
///
/// Absolute links are returned untouched so that the stored URL is exactly
/// what the page published.
fn resolve_link(base: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }

    match Url::parse(base).and_then(|base| base.join(raw)) {
        Ok(joined) => Some(joined.to_string()),
        Err(_) => Some(raw.to_string()),
    }
}
