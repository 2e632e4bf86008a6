use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

/// One listing pulled out of a search page during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// Name of the search page the record came from.
    pub source_config_id: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
}

impl std::fmt::Display for ExtractedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] -> {}",
            self.title.as_deref().unwrap_or("<untitled>"),
            self.price.as_deref().unwrap_or("-"),
            self.url
        )
    }
}

/// A record that has been written to the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PersistedRecord {
    pub id: String,
    pub source_config_id: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn new(record: ExtractedRecord) -> Self {
        Self {
            id: generate_id(),
            source_config_id: record.source_config_id,
            title: record.title,
            price: record.price,
            description: record.description,
            url: record.url,
            image_url: record.image_url,
            created_at: Utc::now(),
        }
    }
}
