//! Crawl coordinator: mode selection and worker wiring
//!
//! Turns a validated [`Config`] plus a [`CrawlMode`] into a fully wired
//! [`CrawlWorker`]. Fleet mode talks to the shared store and fails fast if it
//! is unreachable; manual-range mode is purely local.

use crate::config::{resolve_node_id, Config, FleetConfig};
use crate::crawler::worker::{CrawlSummary, CrawlWorker, WorkerDeps, WorkerSettings};
use crate::dedup::{FleetDedup, LocalDedup, SharedDedup};
use crate::fetch::{HttpFetcher, RecordFetcher};
use crate::output::{LocalPersistence, RecordWriter, SeenLog};
use crate::queue::{partition, RangeSource, SharedQueue};
use crate::registry::NodeRegistry;
use crate::store::{open_fleet_store, SharedStore};
use crate::transform::{ProductTransform, RecordTransform};
use crate::{ConfigError, CrawlError};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a node obtains work and deduplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Units, dedup and registry in the shared store
    Fleet,
    /// A bounded range partitioned locally; no shared coordination
    ManualRange { start: u64, end: u64 },
}

impl CrawlMode {
    /// An explicit range wins; otherwise fleet mode iff `[fleet]` is configured
    pub fn select(config: &Config, range: Option<(u64, u64)>) -> Self {
        match range {
            Some((start, end)) => CrawlMode::ManualRange { start, end },
            None if config.fleet.is_some() => CrawlMode::Fleet,
            None => CrawlMode::ManualRange {
                start: config.crawl.range_start,
                end: config.crawl.range_end,
            },
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlMode::Fleet => write!(f, "fleet"),
            CrawlMode::ManualRange { start, end } => write!(f, "manual range {}:{}", start, end),
        }
    }
}

/// What a run would do, for `--dry-run`
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub mode: CrawlMode,
    pub node_id: String,
    pub range_start: u64,
    pub range_end: u64,
    pub chunk_size: u64,
    pub units: usize,
}

impl CrawlPlan {
    pub fn new(config: &Config, mode: CrawlMode) -> crate::Result<Self> {
        let (range_start, range_end) = match mode {
            CrawlMode::Fleet => (config.crawl.range_start, config.crawl.range_end),
            CrawlMode::ManualRange { start, end } => (start, end),
        };
        let units = partition(range_start, range_end, config.crawl.chunk_size)?.len();
        Ok(Self {
            mode,
            node_id: resolve_node_id(config.fleet.as_ref()),
            range_start,
            range_end,
            chunk_size: config.crawl.chunk_size,
            units,
        })
    }
}

/// Opens the fleet store and verifies it answers
///
/// An unreachable store is a fatal startup error in fleet mode.
pub async fn connect_fleet_store(fleet: &FleetConfig) -> crate::Result<Arc<dyn SharedStore>> {
    let store = open_fleet_store(fleet)?;
    store
        .ping()
        .await
        .map_err(|e| CrawlError::StoreUnavailable {
            url: store.endpoint(),
            reason: e.to_string(),
        })?;
    tracing::info!("Shared store {} is reachable", store.endpoint());
    Ok(store)
}

/// Wires fleet-mode collaborators over an already connected store
pub fn fleet_deps(
    store: Arc<dyn SharedStore>,
    fleet: &FleetConfig,
    seen: HashSet<String>,
    fetcher: Arc<dyn RecordFetcher>,
    transform: Arc<dyn RecordTransform>,
) -> WorkerDeps {
    WorkerDeps {
        source: Arc::new(SharedQueue::new(store.clone(), fleet.queue_key.clone())),
        dedup: Arc::new(FleetDedup::new(
            LocalDedup::from_ids(seen),
            SharedDedup::new(store.clone(), fleet.seen_key.clone()),
        )),
        registry: Some(NodeRegistry::new(
            store,
            fleet.nodes_key.clone(),
            Duration::from_secs(fleet.node_ttl_secs),
        )),
        fetcher,
        transform,
    }
}

/// Wires manual-range collaborators
pub fn manual_deps(
    start: u64,
    end: u64,
    chunk_size: u64,
    seen: HashSet<String>,
    fetcher: Arc<dyn RecordFetcher>,
    transform: Arc<dyn RecordTransform>,
) -> crate::Result<WorkerDeps> {
    Ok(WorkerDeps {
        source: Arc::new(RangeSource::new(start, end, chunk_size)?),
        dedup: Arc::new(LocalDedup::from_ids(seen)),
        registry: None,
        fetcher,
        transform,
    })
}

/// Runs one node's crawl to completion
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `mode` - Fleet or manual-range operation
/// * `shutdown` - Cancelled on interrupt to start the graceful drain
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The worker stopped (drained, interrupted, or auto-stopped)
/// * `Err(CrawlError)` - A fatal startup error
pub async fn run_crawl(
    config: &Config,
    mode: CrawlMode,
    shutdown: CancellationToken,
) -> crate::Result<CrawlSummary> {
    let fetcher = HttpFetcher::from_config(&config.api)?;
    let transform: Arc<dyn RecordTransform> = Arc::new(ProductTransform::for_api(fetcher.base_url()));
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(fetcher);

    let seen_log = SeenLog::new(&config.output.seen_ids_path);
    let seen = seen_log.load()?;
    tracing::info!(
        "Loaded {} seen identifiers from {}",
        seen.len(),
        seen_log.path().display()
    );
    let persistence = LocalPersistence::new(
        RecordWriter::new(&config.output.records_path, transform.headers()),
        seen_log,
    );

    let deps = match mode {
        CrawlMode::Fleet => {
            let fleet = config.fleet.as_ref().ok_or(ConfigError::MissingFleet)?;
            let store = connect_fleet_store(fleet).await?;
            fleet_deps(store, fleet, seen, fetcher, transform)
        }
        CrawlMode::ManualRange { start, end } => {
            manual_deps(start, end, config.crawl.chunk_size, seen, fetcher, transform)?
        }
    };

    let node_id = resolve_node_id(config.fleet.as_ref());
    tracing::info!("Node {} running in {} mode", node_id, mode);

    let mut worker = CrawlWorker::new(
        deps,
        WorkerSettings::from_config(&config.crawl, node_id),
        config.controller.clone(),
        persistence,
        shutdown,
    );
    Ok(worker.run().await)
}
