//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the record API and run full
//! crawls end-to-end, in manual-range mode through `run_crawl` and in fleet
//! mode over an in-memory shared store.

use idcrawl::config::Config;
use idcrawl::crawler::{fleet_deps, run_crawl, CrawlMode, CrawlWorker, StopReason, WorkerSettings};
use idcrawl::fetch::{HttpFetcher, RecordFetcher};
use idcrawl::output::{LocalPersistence, RecordWriter, SeenLog};
use idcrawl::queue::SharedQueue;
use idcrawl::registry::NodeRegistry;
use idcrawl::store::{MemoryStore, SharedStore};
use idcrawl::transform::{ProductTransform, RecordTransform, PRODUCT_COLUMNS};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Even IDs are products, multiples of 3 are upstream errors, the rest miss
struct CatalogResponder;

impl Respond for CatalogResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: u64 = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1);

        if id % 3 == 0 {
            ResponseTemplate::new(500)
        } else if id % 2 == 0 {
            ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {
                    "name": format!("Product {}", id),
                    "special_price": id * 10,
                    "category": "1/2",
                    "picture": [format!("https://img.example/{}.jpg", id)],
                    "created_at": "2024-01-02T03:04:05Z"
                }
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({"code": 404, "msg": "not found"}))
        }
    }
}

/// IDs in [start, end) the mock serves as records
fn expected_ids(start: u64, end: u64) -> HashSet<String> {
    (start..end)
        .filter(|id| id % 2 == 0 && id % 3 != 0)
        .map(|id| id.to_string())
        .collect()
}

async fn start_catalog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/info"))
        .respond_with(CatalogResponder)
        .mount(&server)
        .await;
    server
}

fn test_config(server: &MockServer, dir: &Path, range_end: u64, chunk: u64) -> Config {
    toml::from_str(&format!(
        r#"
[api]
base-url = "{}/product/info"
max-connections = 8

[crawl]
range-start = 0
range-end = {}
chunk-size = {}
empty-queue-wait-secs = 0
save-interval = 7

[controller]
initial-batch-size = 10
min-batch-size = 2
max-batch-size = 16

[output]
records-path = "{}"
seen-ids-path = "{}"
"#,
        server.uri(),
        range_end,
        chunk,
        dir.join("records.csv").display(),
        dir.join("seen.txt").display()
    ))
    .unwrap()
}

/// Reads the id column of a dataset written by the crawler
fn persisted_ids(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|row| row.unwrap().get(0).unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_manual_range_crawl_end_to_end() {
    let server = start_catalog().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), 60, 20);

    let summary = run_crawl(
        &config,
        CrawlMode::ManualRange { start: 0, end: 60 },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.reason, StopReason::QueueDrained);
    assert_eq!(summary.units_completed, 3);
    assert_eq!(summary.requests, 60);
    assert_eq!(summary.errors, 20);
    assert_eq!(summary.unique, 20);
    assert_eq!(summary.flushed, 20);

    let records = dir.path().join("records.csv");
    let content = fs::read_to_string(&records).unwrap();
    let header = content.lines().next().unwrap();
    let expected_header: Vec<String> = PRODUCT_COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    assert_eq!(header, expected_header.join(","));

    let ids = persisted_ids(&records);
    assert_eq!(ids.len(), 20);
    assert_eq!(ids.iter().cloned().collect::<HashSet<_>>(), expected_ids(0, 60));

    let seen = SeenLog::new(dir.path().join("seen.txt")).load().unwrap();
    assert_eq!(seen, expected_ids(0, 60));
}

#[tokio::test]
async fn test_restart_skips_already_seen_records() {
    let server = start_catalog().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), 40, 20);

    let first = run_crawl(&config, CrawlMode::select(&config, None), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.unique, 13);

    // A wider second run only adds the new range's records.
    let second = run_crawl(
        &config,
        CrawlMode::ManualRange { start: 0, end: 60 },
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(second.unique, 7);
    assert_eq!(second.duplicates, 13);

    let ids = persisted_ids(&dir.path().join("records.csv"));
    assert_eq!(ids.len(), 20);
    assert_eq!(ids.into_iter().collect::<HashSet<_>>(), expected_ids(0, 60));
}

#[tokio::test]
async fn test_record_row_contents() {
    let server = start_catalog().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), 5, 5);

    run_crawl(&config, CrawlMode::ManualRange { start: 4, end: 5 }, CancellationToken::new())
        .await
        .unwrap();

    let mut reader = csv::Reader::from_path(dir.path().join("records.csv")).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    let column = |name: &str| {
        let idx = PRODUCT_COLUMNS.iter().position(|c| *c == name).unwrap();
        row.get(idx).unwrap().to_string()
    };

    assert_eq!(column("id"), "4");
    assert_eq!(column("slug"), "product-4-4");
    assert_eq!(column("price"), "40");
    assert_eq!(column("main_image"), "https://img.example/4.jpg");
    assert_eq!(column("created_at"), "02/01/2024 03:04:05");
    assert_eq!(
        column("link"),
        format!("{}/product_details/4.html", server.uri())
    );
}

#[tokio::test]
async fn test_fleet_workers_share_queue_and_dedup() {
    let server = start_catalog().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path(), 120, 10);
    let fleet = idcrawl::config::FleetConfig::new("redis://unused/0");

    let store = Arc::new(MemoryStore::new());
    SharedQueue::new(store.clone(), fleet.queue_key.clone())
        .initialize(0, 120, 10, false)
        .await
        .unwrap();

    let fetcher: Arc<dyn RecordFetcher> = Arc::new(HttpFetcher::from_config(&config.api).unwrap());
    let transform: Arc<dyn RecordTransform> = Arc::new(ProductTransform::new("https://shop.example/p"));

    let mut workers = Vec::new();
    for node in ["node-a", "node-b", "node-c"] {
        let deps = fleet_deps(store.clone(), &fleet, HashSet::new(), fetcher.clone(), transform.clone());
        let persistence = LocalPersistence::new(
            RecordWriter::new(dir.path().join(format!("{}.csv", node)), transform.headers()),
            SeenLog::new(dir.path().join(format!("{}.seen", node))),
        );
        let mut settings = WorkerSettings::from_config(&config.crawl, node);
        settings.empty_queue_wait = Duration::from_millis(10);
        workers.push(CrawlWorker::new(
            deps,
            settings,
            config.controller.clone(),
            persistence,
            CancellationToken::new(),
        ));
    }

    let mut iter = workers.iter_mut();
    let (a, b, c) = (iter.next().unwrap(), iter.next().unwrap(), iter.next().unwrap());
    let (sa, sb, sc) = tokio::join!(a.run(), b.run(), c.run());

    for summary in [&sa, &sb, &sc] {
        assert_eq!(summary.reason, StopReason::QueueDrained);
    }
    assert_eq!(sa.units_completed + sb.units_completed + sc.units_completed, 12);
    assert_eq!(sa.unique + sb.unique + sc.unique, 40);

    let mut all_ids = Vec::new();
    for node in ["node-a", "node-b", "node-c"] {
        let path = dir.path().join(format!("{}.csv", node));
        if path.exists() {
            all_ids.extend(persisted_ids(&path));
        }
    }
    assert_eq!(all_ids.len(), 40);
    assert_eq!(all_ids.into_iter().collect::<HashSet<_>>(), expected_ids(0, 120));

    assert_eq!(store.list_len(&fleet.queue_key).await.unwrap(), 0);
    assert_eq!(store.set_len(&fleet.seen_key).await.unwrap(), 40);

    let registry = NodeRegistry::new(store.clone(), fleet.nodes_key.clone(), Duration::from_secs(300));
    let nodes = registry.list().await.unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(
        nodes.values().map(|status| status.unique_count).sum::<u64>(),
        40
    );
}
