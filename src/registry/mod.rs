//! Node registry module
//!
//! Each node heartbeats a [`NodeStatus`] into a shared hash whose TTL is
//! refreshed on every write. The Fleet Monitor reads the hash and classifies
//! each node's [`Liveness`] at read time; nothing about liveness is stored.

mod status;

pub use status::{now_epoch_secs, Liveness, NodeStatus};

use crate::store::{SharedStore, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// TTL-refreshed table of per-node status
#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn SharedStore>,
    key: String,
    ttl: Duration,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    /// Upserts this node's status and refreshes the table's TTL
    ///
    /// Fails soft: a missed heartbeat only makes the node look stale.
    pub async fn heartbeat(&self, status: &NodeStatus) -> bool {
        let payload = match serde_json::to_string(status) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode status for {}: {}", status.node_id, e);
                return false;
            }
        };

        match self
            .store
            .hash_upsert_with_ttl(&self.key, &status.node_id, &payload, self.ttl)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Heartbeat to {} ({}) failed: {}",
                    self.key,
                    self.store.endpoint(),
                    e
                );
                false
            }
        }
    }

    /// Returns every registered node's last status
    ///
    /// Entries that do not decode are skipped.
    pub async fn list(&self) -> StoreResult<HashMap<String, NodeStatus>> {
        let raw = self.store.hash_get_all(&self.key).await?;
        let mut nodes = HashMap::with_capacity(raw.len());
        for (node_id, payload) in raw {
            match serde_json::from_str::<NodeStatus>(&payload) {
                Ok(status) => {
                    nodes.insert(node_id, status);
                }
                Err(e) => tracing::warn!("Skipping unreadable status for node {}: {}", node_id, e),
            }
        }
        Ok(nodes)
    }
}
