use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use pricewatch::catalog::{BackoffPolicy, CatalogScanner};
use pricewatch::config::{AppConfig, ScraperConfig};
use pricewatch::pipeline::PriceExtractor;
use pricewatch::scheduler::Scheduler;
use pricewatch::storage::{MemoryStore, PriceStore};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Track own and competitor prices across catalog sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run recurring scans until interrupted
    Watch {
        /// Catalog TOML file
        catalog: PathBuf,
    },
    /// Run a single scan cycle and exit
    Scan {
        /// Catalog TOML file
        catalog: PathBuf,
    },
    /// Vet a selector pair against a live URL before saving it
    TestFetch {
        url: String,
        price_selector: String,
        #[arg(long)]
        name_selector: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewatch=info".parse()?),
        )
        .init();

    let config = AppConfig::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Watch { catalog } => run_watch(&config, &catalog).await,
        Command::Scan { catalog } => scan_once(&config, &catalog).await,
        Command::TestFetch {
            url,
            price_selector,
            name_selector,
        } => test_fetch(&config, &url, &price_selector, name_selector.as_deref()).await,
    }
}

/// Build the scan stack around a catalog file. Settings come through the
/// store's config surface, so file-level overrides and any future
/// non-memory collaborator are consulted the same way.
async fn build_stack(
    config: &AppConfig,
    catalog: &PathBuf,
) -> Result<(Arc<MemoryStore>, Scheduler, Duration)> {
    let store = Arc::new(MemoryStore::from_catalog_file(catalog, config)?);
    let settings = store.get_config().await?;

    let scraper_config = ScraperConfig {
        user_agent: settings.user_agent,
        request_timeout: settings.request_timeout_secs,
        extra_headers: config.scraper.extra_headers.clone(),
    };
    let extractor = PriceExtractor::new(scraper_config)?;
    let scanner = Arc::new(CatalogScanner::new(
        extractor,
        BackoffPolicy::from(&config.backoff),
    ));

    let interval = Duration::from_secs(settings.interval_minutes * 60);
    let scheduler = Scheduler::new(store.clone() as Arc<dyn PriceStore>, scanner);

    Ok((store, scheduler, interval))
}

async fn run_watch(config: &AppConfig, catalog: &PathBuf) -> Result<()> {
    let (_store, mut scheduler, interval) = build_stack(config, catalog).await?;

    scheduler.start(interval).await;
    info!("watching; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.stop().await;

    Ok(())
}

async fn scan_once(config: &AppConfig, catalog: &PathBuf) -> Result<()> {
    let (store, scheduler, _interval) = build_stack(config, catalog).await?;

    let summary = scheduler.run_now().await?;
    println!(
        "scan complete: {} scraped, {} errors",
        summary.scraped, summary.errors
    );

    for record in store.records().await {
        println!(
            "{}: own {} ({} competitor prices)",
            record.item_id,
            record.own_price,
            record.competitor_prices.len()
        );
    }

    Ok(())
}

async fn test_fetch(
    config: &AppConfig,
    url: &str,
    price_selector: &str,
    name_selector: Option<&str>,
) -> Result<()> {
    let extractor = PriceExtractor::new(config.scraper.clone())?;

    match extractor.test_fetch(url, price_selector, name_selector).await {
        Ok(extraction) => {
            println!("{}", serde_json::to_string_pretty(&extraction)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("extraction failed ({:?}): {err}", err.kind());
            std::process::exit(1);
        }
    }
}
