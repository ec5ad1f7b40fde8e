//! idcrawl main entry point
//!
//! This is the command-line interface for the fleet-coordinated ID crawler.

use anyhow::{bail, Context};
use clap::Parser;
use idcrawl::config::{load_config_with_hash, Config, FleetConfig};
use idcrawl::crawler::{connect_fleet_store, print_summary, run_crawl, CrawlMode, CrawlPlan};
use idcrawl::dedup::SharedDedup;
use idcrawl::monitor::{run_monitor, FleetView};
use idcrawl::output::{compact_output, distinct_identifiers, read_identifiers, SeenLog};
use idcrawl::queue::SharedQueue;
use idcrawl::WorkUnit;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// idcrawl: a fleet-coordinated ID-space crawler
///
/// Enumerates a numeric ID range against an HTTP API, deduplicating records
/// across every node that shares the same Redis instance.
#[derive(Parser, Debug)]
#[command(name = "idcrawl")]
#[command(version)]
#[command(about = "A fleet-coordinated ID-space crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl START:END locally instead of claiming units from the fleet queue
    #[arg(long, value_name = "START:END", value_parser = parse_range)]
    range: Option<(u64, u64)>,

    /// Partition the configured range into the shared queue and exit
    #[arg(long, conflicts_with_all = ["monitor", "sync_ids", "compact", "dry_run"])]
    init_queue: bool,

    /// With --init-queue: replace a non-empty queue
    #[arg(long, requires = "init_queue")]
    clear: bool,

    /// Show live fleet status until interrupted
    #[arg(long, conflicts_with_all = ["init_queue", "sync_ids", "compact", "dry_run", "range"])]
    monitor: bool,

    /// Add the id column of an existing CSV to the shared dedup set and exit
    #[arg(long, value_name = "CSV", conflicts_with_all = ["init_queue", "monitor", "compact", "dry_run", "range"])]
    sync_ids: Option<PathBuf>,

    /// Rewrite the output file without duplicate ids and rebuild the seen log
    #[arg(long, conflicts_with_all = ["init_queue", "monitor", "sync_ids", "dry_run", "range"])]
    compact: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["init_queue", "monitor", "sync_ids", "compact"])]
    dry_run: bool,
}

fn parse_range(raw: &str) -> Result<(u64, u64), String> {
    let unit: WorkUnit = raw.parse().map_err(|e| format!("{}", e))?;
    Ok((unit.start, unit.end))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, CrawlMode::select(&config, cli.range))
    } else if cli.init_queue {
        handle_init_queue(&config, cli.range, cli.clear).await
    } else if let Some(csv) = &cli.sync_ids {
        handle_sync_ids(&config, csv).await
    } else if cli.compact {
        handle_compact(&config)
    } else if cli.monitor {
        handle_monitor(&config).await
    } else {
        handle_crawl(&config, CrawlMode::select(&config, cli.range)).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("idcrawl=info,warn"),
            1 => EnvFilter::new("idcrawl=debug,info"),
            2 => EnvFilter::new("idcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels the returned token on the first Ctrl+C
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining (flush buffer, release unit)");
            trigger.cancel();
        }
    });
    token
}

fn require_fleet(config: &Config) -> anyhow::Result<&FleetConfig> {
    match config.fleet.as_ref() {
        Some(fleet) => Ok(fleet),
        None => bail!(idcrawl::ConfigError::MissingFleet),
    }
}

/// Handles --dry-run: validates config and shows the plan
fn handle_dry_run(config: &Config, mode: CrawlMode) -> anyhow::Result<()> {
    let plan = CrawlPlan::new(config, mode)?;

    println!("=== idcrawl Dry Run ===\n");

    println!("Mode: {}", plan.mode);
    println!("Node: {}", plan.node_id);

    println!("\nRange:");
    println!("  [{}, {})", plan.range_start, plan.range_end);
    println!("  Chunk size: {}", plan.chunk_size);
    println!("  Work units: {}", plan.units);

    println!("\nAPI:");
    println!("  Endpoint: {} (?{}=<id>)", config.api.base_url, config.api.id_param);
    println!("  Max connections: {}", config.api.max_connections);
    println!(
        "  Batch size: {} (bounds {}..={})",
        config.controller.initial_batch_size,
        config.controller.min_batch_size,
        config.controller.max_batch_size
    );

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path);
    println!("  Seen IDs: {}", config.output.seen_ids_path);

    if let (CrawlMode::Fleet, Some(fleet)) = (mode, &config.fleet) {
        println!("\nFleet:");
        println!("  Queue: {}", fleet.queue_key);
        println!("  Seen set: {}", fleet.seen_key);
        println!("  Registry: {} (ttl {}s)", fleet.nodes_key, fleet.node_ttl_secs);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles --init-queue: loads the partitioned range into the shared queue
async fn handle_init_queue(
    config: &Config,
    range: Option<(u64, u64)>,
    clear: bool,
) -> anyhow::Result<()> {
    let fleet = require_fleet(config)?;
    let store = connect_fleet_store(fleet).await?;
    let queue = SharedQueue::new(store, fleet.queue_key.clone());

    let (start, end) = range.unwrap_or((config.crawl.range_start, config.crawl.range_end));
    let existing = queue.len().await?;
    println!("Queue {} currently holds {} units", queue.key(), existing);

    let pushed = queue
        .initialize(start, end, config.crawl.chunk_size, clear)
        .await
        .context("queue initialization failed")?;

    println!(
        "✓ Queued {} units covering [{}, {}) in chunks of {}",
        pushed, start, end, config.crawl.chunk_size
    );
    Ok(())
}

/// Handles --sync-ids: seeds the shared dedup set from an existing dataset
async fn handle_sync_ids(config: &Config, csv: &Path) -> anyhow::Result<()> {
    let fleet = require_fleet(config)?;
    let rows = read_identifiers(csv)?;
    let row_count = rows.len();
    let ids = distinct_identifiers(rows);
    println!(
        "Read {} ids from {} ({} repeated within the file)",
        ids.len(),
        csv.display(),
        row_count - ids.len()
    );

    let store = connect_fleet_store(fleet).await?;
    let dedup = SharedDedup::new(store, fleet.seen_key.clone());
    let added = dedup.sync(&ids).await.context("sync to shared set failed")?;

    println!("✓ Added {} new ids ({} already present)", added, ids.len() - added);
    println!("  Shared set now holds {}", dedup.try_count().await?);
    Ok(())
}

/// Handles --compact: deduplicates the output file in place
fn handle_compact(config: &Config) -> anyhow::Result<()> {
    let records = Path::new(&config.output.records_path);
    let report = compact_output(records, &SeenLog::new(&config.output.seen_ids_path))?;

    println!("=== Compaction ===\n");
    println!("  Rows before: {}", report.total_rows);
    println!("  Rows after: {}", report.unique_rows);
    println!("  Removed: {}", report.removed());
    println!("  Backup: {}", report.backup.display());
    Ok(())
}

/// Handles --monitor: live fleet table until Ctrl+C
async fn handle_monitor(config: &Config) -> anyhow::Result<()> {
    let fleet = require_fleet(config)?;
    let store = connect_fleet_store(fleet).await?;
    let view = FleetView::new(store, fleet, config.monitor.clone());

    run_monitor(
        view,
        Duration::from_secs(config.monitor.refresh_secs),
        shutdown_on_ctrl_c(),
    )
    .await;
    println!("\nMonitor stopped");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, mode: CrawlMode) -> anyhow::Result<()> {
    let shutdown = shutdown_on_ctrl_c();

    match run_crawl(config, mode, shutdown).await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.unflushed > 0 {
                bail!("{} records were not written", summary.unflushed);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
