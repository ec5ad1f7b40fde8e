//! Fleet monitor
//!
//! A read-only observer of the shared store: the node registry, the dedup
//! set's cardinality and the queue length. Liveness is computed here, at read
//! time, from each node's last report.

use crate::config::{FleetConfig, MonitorConfig};
use crate::dedup::SharedDedup;
use crate::queue::SharedQueue;
use crate::registry::{now_epoch_secs, Liveness, NodeRegistry, NodeStatus};
use crate::store::{SharedStore, StoreResult};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TABLE_WIDTH: usize = 84;

/// One row of the node table
#[derive(Debug, Clone)]
pub struct NodeRow {
    pub status: NodeStatus,
    pub liveness: Liveness,
    pub age_secs: f64,
}

/// Fleet-wide view at one instant
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    pub total_unique: u64,
    pub queued_units: usize,
    /// Sorted by node ID
    pub nodes: Vec<NodeRow>,
}

impl FleetSnapshot {
    /// Nodes currently classified active
    pub fn active_nodes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|row| row.liveness == Liveness::Active)
            .count()
    }

    /// Sum of active nodes' rates
    pub fn active_rate(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|row| row.liveness == Liveness::Active)
            .map(|row| row.status.rate)
            .sum()
    }
}

/// The shared handles a monitor reads from
pub struct FleetView {
    registry: NodeRegistry,
    dedup: SharedDedup,
    queue: SharedQueue,
    windows: MonitorConfig,
}

impl FleetView {
    pub fn new(store: Arc<dyn SharedStore>, fleet: &FleetConfig, windows: MonitorConfig) -> Self {
        Self {
            registry: NodeRegistry::new(
                store.clone(),
                fleet.nodes_key.clone(),
                Duration::from_secs(fleet.node_ttl_secs),
            ),
            dedup: SharedDedup::new(store.clone(), fleet.seen_key.clone()),
            queue: SharedQueue::new(store, fleet.queue_key.clone()),
            windows,
        }
    }

    /// Reads the registry, dedup count and queue length
    pub async fn snapshot(&self) -> StoreResult<FleetSnapshot> {
        self.snapshot_at(now_epoch_secs()).await
    }

    async fn snapshot_at(&self, now: f64) -> StoreResult<FleetSnapshot> {
        let total_unique = self.dedup.try_count().await?;
        let queued_units = self.queue.len().await?;

        let mut nodes: Vec<NodeRow> = self
            .registry
            .list()
            .await?
            .into_values()
            .map(|status| {
                let age_secs = status.age_secs(now);
                NodeRow {
                    liveness: Liveness::classify(
                        age_secs,
                        self.windows.active_secs,
                        self.windows.stale_secs,
                    ),
                    age_secs,
                    status,
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.status.node_id.cmp(&b.status.node_id));

        Ok(FleetSnapshot {
            total_unique,
            queued_units,
            nodes,
        })
    }
}

/// Formats seconds as `HH:MM:SS`
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Renders the snapshot as a fixed-width table
pub fn render_table(snapshot: &FleetSnapshot) -> String {
    let rule = "=".repeat(TABLE_WIDTH);
    let thin = "-".repeat(TABLE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Fleet Monitor | Total unique: {} | Queued units: {}",
        snapshot.total_unique, snapshot.queued_units
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<24} {:>10} {:>10} {:>8} {:>6} {:>10} {:>10}",
        "Node ID", "Unique", "Rate", "Dup%", "Batch", "Elapsed", "Status"
    );
    let _ = writeln!(out, "{}", thin);

    if snapshot.nodes.is_empty() {
        let _ = writeln!(out, "{:^width$}", "No registered nodes", width = TABLE_WIDTH);
    }
    for row in &snapshot.nodes {
        let s = &row.status;
        let _ = writeln!(
            out,
            "{:<24} {:>10} {:>8.1}/s {:>7.1}% {:>6} {:>10} {:>10}",
            s.node_id,
            s.unique_count,
            s.rate,
            s.dup_ratio * 100.0,
            s.batch_size,
            format_elapsed(s.elapsed),
            row.liveness.to_string()
        );
    }

    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(
        out,
        "{:<24} {:>10} {:>8.1}/s {:>8} {:>6} {:>10} {:>10}",
        "TOTAL",
        snapshot.total_unique,
        snapshot.active_rate(),
        "",
        "",
        "",
        format!("{} active", snapshot.active_nodes())
    );
    let _ = writeln!(out, "{}", rule);
    out
}

/// Polls and redraws until `shutdown` is cancelled
///
/// Store errors are logged and the next poll tries again.
pub async fn run_monitor(view: FleetView, refresh: Duration, shutdown: CancellationToken) {
    loop {
        match view.snapshot().await {
            Ok(snapshot) => {
                // Clear screen, cursor home.
                print!("\x1b[2J\x1b[H{}", render_table(&snapshot));
                println!("Refreshing every {}s, Ctrl+C to exit", refresh.as_secs());
            }
            Err(e) => tracing::warn!("Monitor poll failed: {}", e),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(refresh) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn status(node_id: &str, last_update: f64, rate: f64) -> NodeStatus {
        NodeStatus {
            node_id: node_id.to_string(),
            unique_count: 10,
            rate,
            dup_ratio: 0.25,
            batch_size: 40,
            elapsed: 3_725.0,
            last_update,
            ..NodeStatus::default()
        }
    }

    #[tokio::test]
    async fn test_snapshot_classifies_nodes() {
        let store = Arc::new(MemoryStore::new());
        let fleet = FleetConfig::new("redis://127.0.0.1/0");
        let view = FleetView::new(store.clone(), &fleet, MonitorConfig::default());

        let registry = NodeRegistry::new(store.clone(), fleet.nodes_key.clone(), Duration::from_secs(300));
        let now = 10_000.0;
        registry.heartbeat(&status("c-offline", now - 120.0, 9.0)).await;
        registry.heartbeat(&status("a-active", now - 5.0, 2.0)).await;
        registry.heartbeat(&status("b-stale", now - 45.0, 4.0)).await;
        registry.heartbeat(&status("d-active", now - 30.0, 1.5)).await;

        store
            .set_add(&fleet.seen_key, &["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        store.push_back(&fleet.queue_key, &["0:10".to_string()]).await.unwrap();

        let snapshot = view.snapshot_at(now).await.unwrap();
        assert_eq!(snapshot.total_unique, 2);
        assert_eq!(snapshot.queued_units, 1);

        let liveness: Vec<(&str, Liveness)> = snapshot
            .nodes
            .iter()
            .map(|row| (row.status.node_id.as_str(), row.liveness))
            .collect();
        assert_eq!(
            liveness,
            vec![
                ("a-active", Liveness::Active),
                ("b-stale", Liveness::Stale),
                ("c-offline", Liveness::Offline),
                ("d-active", Liveness::Active),
            ]
        );
        assert_eq!(snapshot.active_nodes(), 2);
        assert_eq!(snapshot.active_rate(), 3.5);
    }

    #[test]
    fn test_render_table() {
        let snapshot = FleetSnapshot {
            total_unique: 1234,
            queued_units: 7,
            nodes: vec![NodeRow {
                status: status("node-a", 0.0, 12.5),
                liveness: Liveness::Active,
                age_secs: 1.0,
            }],
        };
        let table = render_table(&snapshot);
        assert!(table.contains("Total unique: 1234"));
        assert!(table.contains("node-a"));
        assert!(table.contains("01:02:05"));
        assert!(table.contains("25.0%"));
        assert!(table.contains("1 active"));
    }

    #[test]
    fn test_render_empty_fleet() {
        let snapshot = FleetSnapshot {
            total_unique: 0,
            queued_units: 0,
            nodes: vec![],
        };
        assert!(render_table(&snapshot).contains("No registered nodes"));
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        let view = FleetView::new(store, &FleetConfig::new("redis://x/0"), MonitorConfig::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(
            Duration::from_secs(2),
            run_monitor(view, Duration::from_secs(60), shutdown),
        )
        .await
        .unwrap();
    }
}
