use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod search_page;
pub mod search_result;

// Re-exports for convenience
pub use search_page::*;
pub use search_result::*;

/// Query language of a locator expression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    Css,
    #[default]
    Xpath,
}

impl std::fmt::Display for SelectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorType::Css => write!(f, "css"),
            SelectorType::Xpath => write!(f, "xpath"),
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
