use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use search_watcher::scheduler::PageOutcome;
use search_watcher::{AppConfig, ExtractionPipeline, SearchScheduler};

#[derive(Parser)]
#[command(name = "search-watcher")]
#[command(about = "Watches listing pages and reports newly discovered results")]
struct Cli {
    /// Directory holding default.toml and friends
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Write logs to daily rolling files in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled search page on its schedule until Ctrl-C
    Watch,

    /// Run search pages once and print the new results as JSON
    Run {
        /// Only this page
        #[arg(long)]
        page: Option<String>,
    },

    /// List stored results of a search page
    Results {
        #[arg(long)]
        page: String,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;

    let config = AppConfig::from_dir(&cli.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", cli.config_dir))?;
    info!(pages = config.search_pages.len(), "Configuration loaded");

    let pipeline = Arc::new(ExtractionPipeline::from_config(&config).await?);

    match cli.command {
        Commands::Watch => watch(config, pipeline).await,
        Commands::Run { page } => run_once(&config, pipeline, page.as_deref()).await,
        Commands::Results { page, limit } => {
            if config.find_page(&page).is_none() {
                anyhow::bail!("Unknown search page '{}'", page);
            }
            let records = pipeline.store().list_for_page(&page, limit, 0).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
    }
}

fn init_tracing(log_dir: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("search_watcher=debug".parse()?);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "search-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

async fn watch(config: AppConfig, pipeline: Arc<ExtractionPipeline>) -> Result<()> {
    if !config.scheduler.enabled {
        anyhow::bail!("Scheduler is disabled in the configuration");
    }

    info!("Starting Search Watcher...");
    let mut scheduler = SearchScheduler::new(pipeline, config.scheduler.clone()).await?;
    let scheduled = scheduler.schedule_all(&config.search_pages).await?;
    info!(scheduled, "Search pages scheduled");
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    scheduler.shutdown().await?;

    Ok(())
}

async fn run_once(config: &AppConfig, pipeline: Arc<ExtractionPipeline>, only: Option<&str>) -> Result<()> {
    let pages = match only {
        Some(name) => {
            let page = config
                .find_page(name)
                .with_context(|| format!("Unknown search page '{}'", name))?;
            vec![page.clone()]
        }
        None => config.search_pages.clone(),
    };

    let scheduler = SearchScheduler::new(pipeline, config.scheduler.clone()).await?;
    let outcomes = scheduler.run_all_now(&pages).await;

    let mut failed = 0;
    for PageOutcome { page, result } in outcomes {
        match result {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => {
                failed += 1;
                tracing::error!(page = %page, "Run failed: {}", e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} search page(s) failed", failed);
    }
    Ok(())
}
