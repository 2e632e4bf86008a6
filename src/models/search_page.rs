use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use url::Url;
use validator::Validate;

use crate::models::SelectorType;
use crate::utils::error::{AppError, Result};

fn default_true() -> bool {
    true
}

fn default_url_attribute() -> String {
    "href".to_string()
}

fn default_image_attribute() -> String {
    "src".to_string()
}

/// A locator expression together with the language it is written in.
///
/// The engine never looks inside the expression; it is handed to the
/// document as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator<'a> {
    pub kind: SelectorType,
    pub expression: &'a str,
}

impl std::fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.expression)
    }
}

/// How to find results on a page and the fields inside each result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocatorRuleSet {
    #[serde(default)]
    pub selector_type: SelectorType,

    /// Selects the ordered list of result elements.
    #[serde(default)]
    pub results: String,

    // Field locators, relative to a result element
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(default = "default_url_attribute")]
    pub url_attribute: String,
    pub image: Option<String>,
    #[serde(default = "default_image_attribute")]
    pub image_attribute: String,

    /// Results carrying any of these classes are skipped.
    #[serde(default, deserialize_with = "deserialize_omit_classes")]
    pub omit_classes: BTreeSet<String>,

    #[serde(default)]
    pub javascript_required: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LocatorRuleSet {
    fn default() -> Self {
        Self {
            selector_type: SelectorType::default(),
            results: String::new(),
            title: None,
            price: None,
            description: None,
            url: None,
            url_attribute: default_url_attribute(),
            image: None,
            image_attribute: default_image_attribute(),
            omit_classes: BTreeSet::new(),
            javascript_required: false,
            enabled: true,
        }
    }
}

impl LocatorRuleSet {
    pub fn locator<'a>(&self, expression: &'a str) -> Locator<'a> {
        Locator {
            kind: self.selector_type,
            expression,
        }
    }

    /// The results locator, or `None` when it is blank.
    pub fn results_locator(&self) -> Option<Locator<'_>> {
        let expression = self.results.trim();
        if expression.is_empty() {
            None
        } else {
            Some(self.locator(expression))
        }
    }

    /// True when any whitespace-separated token of `class_attr` is omitted.
    pub fn omits(&self, class_attr: &str) -> bool {
        !self.omit_classes.is_empty()
            && class_attr
                .split_whitespace()
                .any(|token| self.omit_classes.contains(token))
    }
}

/// Splits a class list written as `"a, b c"` into its tokens.
pub fn parse_class_tokens(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OmitClassesRepr {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_omit_classes<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OmitClassesRepr::deserialize(deserializer)? {
        OmitClassesRepr::Joined(raw) => parse_class_tokens(&raw),
        OmitClassesRepr::List(items) => items.iter().flat_map(|item| parse_class_tokens(item)).collect(),
    })
}

/// A watched listing page.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct SearchPage {
    /// Unique name; identifies the page in the run guard and on stored records.
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(url)]
    pub url: String,

    /// Cron expression (with seconds); falls back to the scheduler default.
    #[serde(default)]
    pub check_interval: Option<String>,

    #[serde(default)]
    pub rules: LocatorRuleSet,
}

impl SearchPage {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            check_interval: None,
            rules: LocatorRuleSet::default(),
        }
    }

    /// Rejects pages that cannot be fetched or that would have nothing to
    /// enumerate.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()?;

        let parsed = Url::parse(&self.url).map_err(|e| self.invalid(format!("bad url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(self.invalid(format!("unsupported url scheme '{}'", parsed.scheme())));
        }

        if self.rules.enabled && self.rules.results_locator().is_none() {
            return Err(self.invalid("results locator is required for an enabled page"));
        }

        // Static pages are parsed without a DOM engine that speaks XPath
        if self.rules.enabled
            && self.rules.selector_type == SelectorType::Xpath
            && !self.rules.javascript_required
        {
            return Err(self.invalid("xpath locators need javascript_required = true"));
        }

        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> AppError {
        AppError::InvalidPage {
            page: self.name.clone(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SearchPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}
