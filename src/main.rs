//! mapwatch: competitor price monitoring and MAP violation detection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use mapwatch::catalog::{CatalogProvider, JsonCatalog};
use mapwatch::config::Config;
use mapwatch::daemon::{AppState, HttpServer, JobManager};
use mapwatch::matching::{MatchEngine, MatchLifecycle, MatchScorer};
use mapwatch::scraping::{FetchConfig, HttpFetcher, ScrapeRunConfig, ScrapeRunner};
use mapwatch::store::{
    load_competitors_file, BlacklistStore, CompetitorProductStore, CompetitorStore, MatchStore,
    ViolationStore,
};
use mapwatch::violations::ViolationDetector;

#[derive(Parser)]
#[command(name = "mapwatch")]
#[command(about = "Competitor price monitoring and MAP violation detection")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "mapwatch.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon with the HTTP API
    Serve {
        /// Listen address override (e.g. "0.0.0.0:8080")
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Scrape all active competitors once, rescan matches, scan violations,
    /// and print a summary
    Run {
        /// Restrict to one competitor, by name or domain
        #[arg(long)]
        competitor: Option<String>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(default_value = "mapwatch.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Init { path } => init_config(&path),
        Commands::Serve { listen } => {
            let mut config = Config::load(&cli.config)?;
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            serve(config).await
        }
        Commands::Run { competitor, json } => {
            let config = Config::load(&cli.config)?;
            run_once(config, competitor, json).await
        }
    }
}

/// Everything a deployment needs, wired together from the configuration
fn build_state(config: &Config) -> Result<AppState> {
    let catalog: Arc<dyn CatalogProvider> = match &config.catalog.feed_path {
        Some(path) => {
            let catalog = JsonCatalog::load(path)?;
            info!(products = catalog.len(), feed = %path.display(), "catalog feed loaded");
            Arc::new(catalog)
        }
        None => {
            warn!("no catalog feed configured; matching will produce no candidates");
            Arc::new(JsonCatalog::from_products(Vec::new()))
        }
    };

    let competitors = Arc::new(CompetitorStore::new());
    if let Some(path) = &config.scraping.competitors_path {
        let seeded = load_competitors_file(path)?;
        info!(competitors = seeded.len(), roster = %path.display(), "competitor roster loaded");
        for competitor in seeded {
            competitors.upsert(competitor);
        }
    }

    let competitor_products = Arc::new(CompetitorProductStore::new());
    let matches = Arc::new(MatchStore::new());
    let blacklist = Arc::new(BlacklistStore::new());
    let violations = Arc::new(ViolationStore::new());

    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_config(&config.scraping))?);
    let runner = Arc::new(ScrapeRunner::new(
        fetcher,
        Arc::clone(&competitor_products),
        ScrapeRunConfig::from_config(&config.scraping),
    ));
    let jobs = Arc::new(JobManager::new(runner, Arc::clone(&competitors)));

    let engine = Arc::new(MatchEngine::new(MatchScorer::new(config.matching.clone())));
    let lifecycle = Arc::new(MatchLifecycle::new(
        Arc::clone(&matches),
        Arc::clone(&blacklist),
        Arc::clone(&violations),
    ));
    let detector = Arc::new(ViolationDetector::new(config.violations.clone()));

    Ok(AppState {
        competitors,
        competitor_products,
        matches,
        blacklist,
        violations,
        catalog,
        lifecycle,
        engine,
        detector,
        jobs,
    })
}

async fn serve(config: Config) -> Result<()> {
    let state = build_state(&config)?;
    let server = HttpServer::new(config.server.clone(), state);

    let (shutdown_tx, _) = broadcast::channel(1);
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = ctrl_c_tx.send(());
        }
    });

    server.run(shutdown_tx.subscribe()).await
}

async fn run_once(config: Config, only: Option<String>, json: bool) -> Result<()> {
    let state = build_state(&config)?;

    let competitors: Vec<_> = state
        .competitors
        .list()
        .into_iter()
        .filter(|c| c.is_active)
        .filter(|c| {
            only.as_deref()
                .map(|needle| c.name.eq_ignore_ascii_case(needle) || c.domain == needle)
                .unwrap_or(true)
        })
        .collect();
    if competitors.is_empty() {
        anyhow::bail!("no active competitors to scrape (check scraping.competitors_path)");
    }

    let runner = ScrapeRunner::new(
        Arc::new(HttpFetcher::new(FetchConfig::from_config(&config.scraping))?),
        Arc::clone(&state.competitor_products),
        ScrapeRunConfig::from_config(&config.scraping),
    );

    // Scrape failures are isolated per competitor; the batch continues
    let mut scrape_failures = Vec::new();
    for competitor in &competitors {
        match runner
            .run(competitor, CancellationToken::new(), &|_| {})
            .await
        {
            Ok(stats) => info!(
                competitor = %competitor.name,
                upserted = stats.products_upserted,
                "scrape finished"
            ),
            Err(e) => {
                warn!(competitor = %competitor.name, error = %e, "scrape failed");
                scrape_failures.push(format!("{}: {}", competitor.name, e));
            }
        }
    }

    let catalog_products = state.catalog.products();
    let listings = state.competitor_products.all();
    let rescan = state.engine.rescan(
        &catalog_products,
        &listings,
        &state.matches,
        state.blacklist.as_ref(),
    );
    let scan = state.detector.scan(
        &state.matches,
        state.catalog.as_ref(),
        &state.competitor_products,
        &state.violations,
    );
    let open = state.violations.list(Some(false));

    if json {
        let summary = serde_json::json!({
            "competitors_scraped": competitors.len() - scrape_failures.len(),
            "scrape_failures": scrape_failures,
            "listings": listings.len(),
            "matching": rescan,
            "violations": scan,
            "open_violations": open,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Scraped {} competitor(s) ({} failed), {} listing(s) on record",
            competitors.len() - scrape_failures.len(),
            scrape_failures.len(),
            listings.len()
        );
        println!(
            "Matching: {} created, {} updated, {} blacklisted, {} pruned",
            rescan.created, rescan.updated, rescan.blacklisted, rescan.pruned
        );
        println!(
            "Violations: {} created, {} updated, {} closed, {} open",
            scan.created,
            scan.updated,
            scan.closed,
            open.len()
        );
        for violation in &open {
            println!(
                "  [{}] {} vs {}: {} below MAP ({:.1}%)",
                violation.severity,
                violation.catalog_product_id,
                violation.competitor_product_id,
                violation.price_delta,
                violation.violation_percent * 100.0
            );
        }
    }
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing config at {}", path.display());
    }
    let serialized =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
