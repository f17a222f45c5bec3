#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `district_stats`: collect dashboard reports, file them as snapshots,
//! and compute analytics.
//!
//! ```text
//! district_stats scrape    [--date D] [--units a,b] [--force]
//! district_stats transform --date D [--units a,b] [--force]
//! district_stats compute   --date D [--units a,b] [--force]
//! district_stats units
//! ```
//!
//! Every command exits non-zero when its run reports failure.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use district_stats_analytics::rankings::write_rankings_from_summary;
use district_stats_analytics::{AnalyticsComputeEngine, ComputeOptions};
use district_stats_cli_utils::{IndicatifProgress, MultiProgress};
use district_stats_resilience::CircuitBreaker;
use district_stats_scraper::{
    HttpCsvFetcher, Orchestrator, ScrapeOptions, UnitRegistry,
};
use district_stats_snapshot::{CsvStatisticsBuilder, TransformOptions, TransformService};
use district_stats_store::CacheLayout;

use crate::config::{Config, parse_unit_list};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Collect, snapshot, and analyse district statistics.
#[derive(Parser)]
#[command(name = "district_stats")]
#[command(about = "Collect, snapshot, and analyse district statistics")]
struct Cli {
    /// Cache directory (overrides config and `DISTRICT_STATS_CACHE_DIR`).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// TOML config file (default: `district_stats.toml` if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the per-date commands.
#[derive(clap::Args)]
struct RunArgs {
    /// Comma-separated unit IDs (default: every configured unit).
    #[arg(long)]
    units: Option<String>,

    /// Redo work whose output already exists.
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw reports for every unit into `raw-csv/{date}/`.
    Scrape {
        /// Collection date, `YYYY-MM-DD` (default: today, UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Build per-unit snapshots from a collection date's raw reports.
    Transform {
        /// Collection date, `YYYY-MM-DD`.
        #[arg(long)]
        date: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Compute analytics for the snapshot a date resolves to.
    Compute {
        /// Requested date, `YYYY-MM-DD`.
        #[arg(long)]
        date: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List configured units.
    Units,
}

#[tokio::main]
async fn main() -> CliResult {
    let multi = district_stats_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?.with_process_env();
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }
    let layout = CacheLayout::new(&config.cache_dir);

    match cli.command {
        Commands::Scrape { date, run } => cmd_scrape(&config, layout, &multi, date, run).await,
        Commands::Transform { date, run } => cmd_transform(&config, &layout, &date, run),
        Commands::Compute { date, run } => cmd_compute(&config, layout, &date, run),
        Commands::Units => cmd_units(&config),
    }
}

/// Flag value, then config/environment.
fn requested_units(config: &Config, run: &RunArgs) -> Option<Vec<String>> {
    run.units
        .as_deref()
        .map(parse_unit_list)
        .filter(|units| !units.is_empty())
        .or_else(|| config.units.clone())
}

fn load_registry(config: &Config) -> Result<UnitRegistry, district_stats_scraper::ScrapeError> {
    match &config.units_file {
        Some(path) => UnitRegistry::load(path),
        None => UnitRegistry::bundled(),
    }
}

fn print_list(label: &str, items: &[String]) {
    if !items.is_empty() {
        println!("  {label:<10} {}", items.join(", "));
    }
}

async fn cmd_scrape(
    config: &Config,
    layout: CacheLayout,
    multi: &MultiProgress,
    date: Option<NaiveDate>,
    run: RunArgs,
) -> CliResult {
    let fetcher = Arc::new(HttpCsvFetcher::new(&config.base_url)?);
    let breaker = Arc::new(CircuitBreaker::new("dashboard", config.breaker.config()));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping after the current unit");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let orchestrator = Orchestrator::new(layout, fetcher, load_registry(config)?)
        .with_breaker(breaker)
        .with_retry(config.retry.options())
        .with_progress(IndicatifProgress::units_bar(multi, "Collecting"));

    let result = orchestrator
        .scrape(&ScrapeOptions {
            date,
            units: requested_units(config, &run),
            force: run.force,
            cancel: Some(cancel),
        })
        .await?;

    println!("Scrape {} ({}ms)", result.date, result.duration_ms);
    print_list("succeeded", &result.units_succeeded);
    print_list("cached", &result.units_cached);
    print_list("failed", &result.units_failed);
    let skipped: Vec<String> = result
        .units_skipped
        .iter()
        .map(|s| format!("{} ({})", s.unit_id, s.reason))
        .collect();
    print_list("skipped", &skipped);
    if let Some(month) = &result.data_month {
        println!("  closing period: data for {month}");
    }
    if let Some(until) = result.breaker_open_until {
        println!("  circuit open until {until}");
    }
    for error in &result.errors {
        println!(
            "  error [{}] {}",
            error.unit_id.as_deref().unwrap_or("run"),
            error.message
        );
    }

    if result.success() {
        Ok(())
    } else {
        Err(format!("scrape of {} did not fully succeed", result.date).into())
    }
}

fn cmd_transform(config: &Config, layout: &CacheLayout, date: &str, run: RunArgs) -> CliResult {
    let service = TransformService::new(layout.clone(), CsvStatisticsBuilder);
    let result = service.transform(
        date,
        &TransformOptions {
            units: requested_units(config, &run),
            force: run.force,
        },
    )?;

    if result.skipped_run {
        println!(
            "Transform {date}: skipped, {} already holds newer closing-period data",
            result.snapshot_date
        );
        return Ok(());
    }

    println!(
        "Transform {date} -> {} ({}ms)",
        result.snapshot_date, result.duration_ms
    );
    print_list("succeeded", &result.units_succeeded);
    print_list("skipped", &result.units_skipped);
    print_list("failed", &result.units_failed);
    for error in &result.errors {
        println!(
            "  error [{}] {}",
            error.unit_id.as_deref().unwrap_or("run"),
            error.message
        );
    }
    if result.pointer_updated {
        println!("  latest successful snapshot: {}", result.snapshot_date);
    }

    match write_rankings_from_summary(layout, date, &result.snapshot_date) {
        Ok(Some(count)) => println!("  rankings: {count} unit(s)"),
        Ok(None) => log::warn!("No summary for {date}; rankings not written"),
        Err(e) => log::warn!("Rankings for {} not written: {e}", result.snapshot_date),
    }

    if result.success() {
        Ok(())
    } else {
        Err(format!("transform of {date} had {} failed unit(s)", result.units_failed.len()).into())
    }
}

fn cmd_compute(config: &Config, layout: CacheLayout, date: &str, run: RunArgs) -> CliResult {
    let engine = AnalyticsComputeEngine::new(layout);
    let result = engine.compute(
        date,
        &ComputeOptions {
            units: requested_units(config, &run),
            force: run.force,
        },
    )?;

    println!(
        "Compute {date} -> {} ({}ms)",
        result.snapshot_date, result.duration_ms
    );
    print_list("computed", &result.units_computed);
    print_list("unchanged", &result.units_skipped);
    print_list("failed", &result.units_failed);
    for error in result.errors.iter().chain(&result.time_series_errors) {
        println!(
            "  error [{}] {}",
            error.unit_id.as_deref().unwrap_or("run"),
            error.message
        );
    }
    if let Some(manifest) = &result.manifest {
        println!(
            "  manifest: {} file(s), {} bytes",
            manifest.total_files, manifest.total_size
        );
    }

    if result.success() {
        Ok(())
    } else {
        Err(format!("compute for {date} had {} failed unit(s)", result.units_failed.len()).into())
    }
}

fn cmd_units(config: &Config) -> CliResult {
    let registry = load_registry(config)?;
    for unit in registry.units() {
        println!(
            "{:<6} {:<4} {}{}",
            unit.id,
            unit.region,
            unit.name,
            if unit.enabled { "" } else { " (disabled)" }
        );
    }
    Ok(())
}
