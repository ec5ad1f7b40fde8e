use crate::dedup::{DedupStore, LocalDedup, SharedDedup};
use async_trait::async_trait;

/// Fleet-mode dedup: local mirror in front of the shared set
///
/// Identifiers already in the local mirror are duplicates without a network
/// round trip. Otherwise the shared set's atomic add decides: the node whose
/// add reports a new member wins, and every other node must treat its fetch
/// as a duplicate. Both outcomes are mirrored locally.
///
/// When the shared store is unreachable the check falls back to the local
/// mirror alone, so the crawl continues without cross-node dedup.
pub struct FleetDedup {
    local: LocalDedup,
    shared: SharedDedup,
}

impl FleetDedup {
    pub fn new(local: LocalDedup, shared: SharedDedup) -> Self {
        Self { local, shared }
    }

    /// The local mirror
    pub fn local(&self) -> &LocalDedup {
        &self.local
    }
}

#[async_trait]
impl DedupStore for FleetDedup {
    async fn seen(&self, id: &str) -> bool {
        if self.local.seen(id).await {
            return true;
        }
        match self.shared.try_contains(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Shared seen({}) unavailable, using local mirror: {}", id, e);
                false
            }
        }
    }

    async fn mark(&self, id: &str) -> bool {
        if self.local.seen(id).await {
            return false;
        }
        match self.shared.try_add(&[id.to_string()]).await {
            Ok(added) => {
                self.local.mark(id).await;
                added == 1
            }
            Err(e) => {
                tracing::debug!("Shared mark({}) unavailable, using local mirror: {}", id, e);
                self.local.mark(id).await
            }
        }
    }

    async fn mark_batch(&self, ids: &[String]) -> usize {
        let mut unknown = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.local.seen(id).await && !unknown.contains(id) {
                unknown.push(id.clone());
            }
        }
        if unknown.is_empty() {
            return 0;
        }

        match self.shared.try_add(&unknown).await {
            Ok(added) => {
                self.local.mark_batch(&unknown).await;
                added
            }
            Err(e) => {
                tracing::debug!("Shared mark_batch unavailable, using local mirror: {}", e);
                self.local.mark_batch(&unknown).await
            }
        }
    }

    async fn count(&self) -> u64 {
        match self.shared.try_count().await {
            Ok(count) => count,
            Err(_) => self.local.count().await,
        }
    }

    fn describe(&self) -> String {
        format!("{} with local mirror", self.shared.describe())
    }
}
