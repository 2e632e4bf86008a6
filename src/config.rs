use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;
use tokio_cron_scheduler::Job;

use crate::models::SearchPage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub search_pages: Vec<SearchPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Seconds allowed for a page to load.
    pub request_timeout: u64,
    pub chrome_path: Option<String>,
    /// Launch headless Chrome for pages that need JavaScript.
    pub browser_enabled: bool,
    /// How long a run waits for the previous run of the same page.
    pub guard_timeout_ms: u64,
}

impl ScraperConfig {
    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub default_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    /// Digest recipient; email is off while this is unset.
    pub to_address: Option<String>,
    pub use_tls: bool,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        self.to_address.is_some()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_dir("config")
    }

    pub fn from_dir(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)))
            // Add environment-specific config
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.guard_timeout_ms == 0 {
            return Err(ConfigError::Message("Scraper guard_timeout_ms must be greater than 0".into()));
        }

        if !is_valid_cron(&self.scheduler.default_interval) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.default_interval".into()));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        let mut names = HashSet::new();
        for page in &self.search_pages {
            if !names.insert(page.name.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate search page name '{}'", page.name)));
            }

            page.ensure_valid()
                .map_err(|e| ConfigError::Message(e.to_string()))?;

            if let Some(interval) = &page.check_interval {
                if !is_valid_cron(interval) {
                    return Err(ConfigError::Message(format!(
                        "Invalid cron expression for search page '{}'",
                        page.name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn find_page(&self, name: &str) -> Option<&SearchPage> {
        self.search_pages.iter().find(|page| page.name == name)
    }
}

/// Whether the job scheduler accepts `cron_expr`: six or seven fields
/// (seconds first), with numbers or month/day names.
pub fn is_valid_cron(cron_expr: &str) -> bool {
    Job::new(cron_expr, |_uuid, _l| {}).is_ok()
}
