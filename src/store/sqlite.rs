//! SQLite storage for extracted records.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use super::RecordStore;
use crate::config::DatabaseConfig;
use crate::models::{ExtractedRecord, PersistedRecord};
use crate::utils::error::Result;

const RECORD_COLUMNS: &str =
    "id, source_config_id, title, price, description, url, image_url, created_at";

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Connects to `database_url`, creating the database file if needed.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::connect(database_url, SqlitePoolOptions::new().max_connections(max_connections)).await
    }

    async fn connect(database_url: &str, pool_options: SqlitePoolOptions) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.url, config.max_connections).await
    }

    /// An in-memory database. Every SQLite memory connection is its own
    /// database, so the pool holds exactly one and never recycles it.
    pub async fn in_memory() -> Result<Self> {
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect("sqlite::memory:", pool_options).await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_results (
                id TEXT PRIMARY KEY,
                source_config_id TEXT NOT NULL,
                title TEXT,
                price TEXT,
                description TEXT,
                url TEXT NOT NULL,
                image_url TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_results_url ON search_results(url)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_search_results_page ON search_results(source_config_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedRecord>> {
        let record = sqlx::query_as::<_, PersistedRecord>(&format!(
            "SELECT {} FROM search_results WHERE url = ? LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn save(&self, record: &ExtractedRecord) -> Result<PersistedRecord> {
        let persisted = PersistedRecord::new(record.clone());

        sqlx::query(&format!(
            "INSERT INTO search_results ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            RECORD_COLUMNS
        ))
        .bind(&persisted.id)
        .bind(&persisted.source_config_id)
        .bind(&persisted.title)
        .bind(&persisted.price)
        .bind(&persisted.description)
        .bind(&persisted.url)
        .bind(&persisted.image_url)
        .bind(persisted.created_at)
        .execute(&self.pool)
        .await?;

        Ok(persisted)
    }

    async fn list_for_page(&self, config_id: &str, limit: u32, offset: u32) -> Result<Vec<PersistedRecord>> {
        let records = sqlx::query_as::<_, PersistedRecord>(&format!(
            "SELECT {} FROM search_results WHERE source_config_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            RECORD_COLUMNS
        ))
        .bind(config_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
