//! Integration tests for fleet coordination
//!
//! Several workers share one in-memory store standing in for Redis. The
//! fetchers here are scripted so each test controls exactly which records
//! exist and when an interrupt or outage happens.

use async_trait::async_trait;
use idcrawl::config::{ControllerConfig, FleetConfig};
use idcrawl::crawler::{fleet_deps, CrawlSummary, CrawlWorker, StopReason, WorkerSettings};
use idcrawl::dedup::{DedupStore, SharedDedup};
use idcrawl::fetch::{FetchOutcome, RecordFetcher};
use idcrawl::output::{LocalPersistence, RecordWriter, SeenLog};
use idcrawl::queue::SharedQueue;
use idcrawl::store::{MemoryStore, SharedStore};
use idcrawl::transform::{ProductTransform, RecordTransform};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Every ID is a record whose identifier is `id % modulus`
struct CollidingFetcher {
    modulus: u64,
}

#[async_trait]
impl RecordFetcher for CollidingFetcher {
    async fn fetch(&self, id: u64) -> FetchOutcome {
        tokio::task::yield_now().await;
        let identifier = id % self.modulus;
        FetchOutcome::Found(json!({"id": identifier, "name": format!("Item {}", identifier)}))
    }
}

/// Every ID is its own record; fetching `trigger` fires `hook` first
struct ScriptedFetcher {
    trigger: u64,
    hook: Box<dyn Fn() + Send + Sync>,
}

#[async_trait]
impl RecordFetcher for ScriptedFetcher {
    async fn fetch(&self, id: u64) -> FetchOutcome {
        if id == self.trigger {
            (self.hook)();
        }
        tokio::task::yield_now().await;
        FetchOutcome::Found(json!({"id": id, "name": format!("Item {}", id)}))
    }
}

struct Node {
    worker: CrawlWorker,
    records: PathBuf,
    seen: PathBuf,
}

fn node(
    dir: &Path,
    name: &str,
    store: &Arc<MemoryStore>,
    fleet: &FleetConfig,
    fetcher: Arc<dyn RecordFetcher>,
    shutdown: CancellationToken,
) -> Node {
    let transform: Arc<dyn RecordTransform> = Arc::new(ProductTransform::new("https://shop.example/p"));
    let records = dir.join(format!("{}.csv", name));
    let seen = dir.join(format!("{}.seen", name));
    let persistence = LocalPersistence::new(
        RecordWriter::new(&records, transform.headers()),
        SeenLog::new(&seen),
    );
    let settings = WorkerSettings {
        node_id: name.to_string(),
        empty_queue_wait: Duration::from_millis(10),
        save_interval: 1_000,
        max_duplicate_ratio: None,
        duplicate_window: 100,
        target_unique: None,
    };
    let deps = fleet_deps(store.clone(), fleet, HashSet::new(), fetcher, transform);
    Node {
        worker: CrawlWorker::new(deps, settings, ControllerConfig::default(), persistence, shutdown),
        records,
        seen,
    }
}

/// Identifier column of a node's dataset; empty if it never wrote one
fn persisted_ids(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|row| row.unwrap().get(0).unwrap().to_string())
        .collect()
}

fn unit_counts(items: Vec<String>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    counts
}

async fn seeded_store(fleet: &FleetConfig, end: u64, chunk: u64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    SharedQueue::new(store.clone(), fleet.queue_key.clone())
        .initialize(0, end, chunk, false)
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_concurrent_workers_persist_each_identifier_once() {
    let dir = TempDir::new().unwrap();
    let fleet = FleetConfig::new("redis://unused/0");
    let store = seeded_store(&fleet, 200, 10).await;
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(CollidingFetcher { modulus: 7 });

    let mut nodes: Vec<Node> = ["n1", "n2", "n3", "n4"]
        .iter()
        .map(|name| node(dir.path(), name, &store, &fleet, fetcher.clone(), CancellationToken::new()))
        .collect();

    let summaries: Vec<CrawlSummary> =
        futures::future::join_all(nodes.iter_mut().map(|n| n.worker.run())).await;

    assert!(summaries.iter().all(|s| s.reason == StopReason::QueueDrained));
    assert_eq!(summaries.iter().map(|s| s.units_completed).sum::<u64>(), 20);
    assert_eq!(summaries.iter().map(|s| s.requests).sum::<u64>(), 200);
    assert_eq!(summaries.iter().map(|s| s.unique).sum::<u64>(), 7);
    assert_eq!(summaries.iter().map(|s| s.duplicates).sum::<u64>(), 193);

    let mut all_ids: Vec<String> = nodes.iter().flat_map(|n| persisted_ids(&n.records)).collect();
    all_ids.sort();
    let expected: Vec<String> = (0..7).map(|i| i.to_string()).collect();
    assert_eq!(all_ids, expected);

    assert_eq!(store.set_len(&fleet.seen_key).await.unwrap(), 7);
    assert_eq!(store.list_len(&fleet.queue_key).await.unwrap(), 0);
}

#[tokio::test]
async fn test_interrupt_flushes_buffer_and_releases_unit() {
    let dir = TempDir::new().unwrap();
    let fleet = FleetConfig::new("redis://unused/0");
    let store = seeded_store(&fleet, 60, 20).await;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(ScriptedFetcher {
        trigger: 25,
        hook: Box::new(move || trigger.cancel()),
    });

    let mut first = node(dir.path(), "first", &store, &fleet, fetcher, shutdown);
    let summary = first.worker.run().await;

    assert_eq!(summary.reason, StopReason::Interrupted);
    assert_eq!(summary.units_completed, 1);
    assert_eq!(summary.unflushed, 0);
    assert_eq!(summary.flushed, summary.unique);
    assert!(summary.unique >= 20);

    // The interrupted unit is back exactly once, behind the untouched one.
    assert_eq!(store.list_items(&fleet.queue_key).await, vec!["40:60", "20:40"]);

    let first_ids = persisted_ids(&first.records);
    assert_eq!(first_ids.len() as u64, summary.flushed);
    let header_lines = std::fs::read_to_string(&first.records)
        .unwrap()
        .lines()
        .filter(|line| line.starts_with("\"id\""))
        .count();
    assert_eq!(header_lines, 1);
    let logged = SeenLog::new(&first.seen).load().unwrap();
    assert_eq!(logged, first_ids.iter().cloned().collect::<HashSet<_>>());

    // A second node finishes the job without re-persisting anything.
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(ScriptedFetcher {
        trigger: u64::MAX,
        hook: Box::new(|| {}),
    });
    let mut second = node(dir.path(), "second", &store, &fleet, fetcher, CancellationToken::new());
    let resumed = second.worker.run().await;
    assert_eq!(resumed.reason, StopReason::QueueDrained);
    assert_eq!(resumed.units_completed, 2);

    let mut all_ids = first_ids;
    all_ids.extend(persisted_ids(&second.records));
    assert_eq!(all_ids.len(), 60);
    assert_eq!(
        all_ids.into_iter().collect::<HashSet<_>>(),
        (0..60u64).map(|i| i.to_string()).collect::<HashSet<_>>()
    );
}

#[tokio::test]
async fn test_store_outage_degrades_to_local_dedup() {
    let dir = TempDir::new().unwrap();
    let fleet = FleetConfig::new("redis://unused/0");
    let store = seeded_store(&fleet, 40, 20).await;

    let outage = store.clone();
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(ScriptedFetcher {
        trigger: 5,
        hook: Box::new(move || outage.set_offline(true)),
    });

    let mut only = node(dir.path(), "only", &store, &fleet, fetcher, CancellationToken::new());
    let summary = only.worker.run().await;

    // The in-flight unit finishes locally; the unreachable queue then looks empty.
    assert_eq!(summary.reason, StopReason::QueueDrained);
    assert_eq!(summary.units_completed, 1);
    assert_eq!(summary.unique, 20);
    assert_eq!(summary.unflushed, 0);
    assert_eq!(persisted_ids(&only.records).len(), 20);

    store.set_offline(false);
    assert_eq!(store.list_items(&fleet.queue_key).await, vec!["20:40"]);
}

#[tokio::test]
async fn test_queue_conservation_across_workers() {
    let dir = TempDir::new().unwrap();
    let fleet = FleetConfig::new("redis://unused/0");
    let store = seeded_store(&fleet, 1_000, 50).await;
    let initial = unit_counts(store.list_items(&fleet.queue_key).await);
    assert_eq!(initial.len(), 20);

    // Interrupt partway; every unit is either completed or back in the queue.
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let fetcher: Arc<dyn RecordFetcher> = Arc::new(ScriptedFetcher {
        trigger: 333,
        hook: Box::new(move || trigger.cancel()),
    });
    let mut nodes: Vec<Node> = ["a", "b"]
        .iter()
        .map(|name| node(dir.path(), name, &store, &fleet, fetcher.clone(), shutdown.clone()))
        .collect();
    let summaries: Vec<CrawlSummary> =
        futures::future::join_all(nodes.iter_mut().map(|n| n.worker.run())).await;

    let completed: u64 = summaries.iter().map(|s| s.units_completed).sum();
    let remaining = unit_counts(store.list_items(&fleet.queue_key).await);
    assert!(remaining.values().all(|&count| count == 1));
    assert_eq!(completed as usize + remaining.len(), initial.len());
    assert!(remaining.keys().all(|unit| initial.contains_key(unit)));
}

#[tokio::test]
async fn test_shared_dedup_counts_distinct_identifiers() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let dedup = SharedDedup::new(store, "crawler:seen");

    assert!(dedup.mark("7").await);
    assert!(!dedup.mark("7").await);
    assert!(dedup.mark("9").await);
    assert_eq!(dedup.count().await, 2);
}
