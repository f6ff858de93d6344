//! lofty-books entry point.
//!
//! Loads configuration, initialises structured logging and runs one of
//! the explicit actions: `fetch` (harvest the marketplace into CSVs),
//! `analyze` (merge per-property books) or `sync` (both, in order).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use lofty_books::api::lofty::LoftyClient;
use lofty_books::config::AppConfig;
use lofty_books::engine::aggregator::{AggregateReport, OrderAggregator};
use lofty_books::engine::harvester::{HarvestReport, Harvester};

#[derive(Debug, Parser)]
#[command(name = "lofty-books")]
#[command(about = "Harvest Lofty order books and merge them into one CSV")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch properties, order books and histories into CSV files
    Fetch,
    /// Merge per-property open orders into one sorted CSV
    Analyze {
        /// Only include asset units on the liquidity-pool allowlist
        #[arg(long)]
        lp_only: bool,
    },
    /// Fetch, then analyze
    Sync {
        #[arg(long)]
        lp_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let args = Args::parse();
    let mut cfg = AppConfig::load_or_default(&args.config)?;
    if let Some(dir) = args.output_dir {
        cfg.output.dir = dir;
    }

    info!(
        command = ?args.command,
        output_dir = %cfg.output.dir.display(),
        api = %cfg.api.base_url,
        "lofty-books starting"
    );

    match args.command {
        Command::Fetch => {
            fetch(&cfg).await?;
        }
        Command::Analyze { lp_only } => {
            analyze(&cfg, lp_only)?;
        }
        Command::Sync { lp_only } => {
            let harvest = fetch(&cfg).await?;
            if !harvest.failures.is_empty() {
                warn!(
                    failures = harvest.failures.len(),
                    "Some properties were not refreshed, analysing what is on disk"
                );
            }
            analyze(&cfg, lp_only)?;
        }
    }

    Ok(())
}

async fn fetch(cfg: &AppConfig) -> Result<HarvestReport> {
    let client = LoftyClient::new(&cfg.api)?;
    let harvester = Harvester::new(
        client,
        cfg.output.dir.clone(),
        cfg.api.page_size,
        cfg.api.max_pages,
    );
    let report = harvester.run().await.context("Harvest failed")?;

    for f in &report.failures {
        warn!(
            asset_unit = %f.asset_unit,
            stage = %f.stage,
            reason = %f.reason,
            "Not refreshed"
        );
    }
    Ok(report)
}

fn analyze(cfg: &AppConfig, lp_only: bool) -> Result<AggregateReport> {
    let report = OrderAggregator::from_config(&cfg.output, lp_only)
        .run()
        .context("Order book aggregation failed")?;

    info!(
        output = %report.output.display(),
        files = report.included.len(),
        skipped = ?report.skipped,
        rows = report.rows,
        "Analysis complete"
    );
    Ok(report)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lofty_books=info"));

    let json_logging = std::env::var("LOFTY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_lp_only() {
        let args = Args::parse_from(["lofty-books", "--output-dir", "data", "analyze", "--lp-only"]);
        assert_eq!(args.output_dir, Some(PathBuf::from("data")));
        assert!(matches!(args.command, Command::Analyze { lp_only: true }));
        assert_eq!(args.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_parse_fetch() {
        let args = Args::parse_from(["lofty-books", "-c", "other.toml", "fetch"]);
        assert!(matches!(args.command, Command::Fetch));
        assert_eq!(args.config, PathBuf::from("other.toml"));
    }
}
