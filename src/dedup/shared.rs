use crate::dedup::DedupStore;
use crate::store::{SharedStore, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Identifiers are added to the shared set in batches of this size when syncing
pub const SYNC_BATCH: usize = 10_000;

/// The fleet-wide dedup set held in the shared store
///
/// The [`DedupStore`] impl fails soft: while the store is unreachable `seen`
/// and `mark` return false and `count` returns 0. Use [`FleetDedup`] in
/// workers, which keeps deduplicating locally instead.
///
/// [`FleetDedup`]: crate::dedup::FleetDedup
#[derive(Clone)]
pub struct SharedDedup {
    store: Arc<dyn SharedStore>,
    key: String,
}

impl SharedDedup {
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Atomically adds identifiers, returning how many were not present
    pub async fn try_add(&self, ids: &[String]) -> StoreResult<usize> {
        self.store.set_add(&self.key, ids).await
    }

    /// Tests membership, surfacing store errors
    pub async fn try_contains(&self, id: &str) -> StoreResult<bool> {
        self.store.set_contains(&self.key, id).await
    }

    /// Cardinality of the set, surfacing store errors
    pub async fn try_count(&self) -> StoreResult<u64> {
        Ok(self.store.set_len(&self.key).await? as u64)
    }

    /// Bulk-loads identifiers in [`SYNC_BATCH`]-sized chunks
    ///
    /// # Returns
    ///
    /// The number of identifiers that were not already in the set
    pub async fn sync(&self, ids: &[String]) -> StoreResult<usize> {
        let mut added = 0;
        for (i, batch) in ids.chunks(SYNC_BATCH).enumerate() {
            added += self.try_add(batch).await?;
            tracing::debug!(
                "Synced batch {} ({} ids) into {}",
                i + 1,
                batch.len(),
                self.key
            );
        }
        Ok(added)
    }
}

#[async_trait]
impl DedupStore for SharedDedup {
    async fn seen(&self, id: &str) -> bool {
        self.try_contains(id).await.unwrap_or(false)
    }

    async fn mark(&self, id: &str) -> bool {
        matches!(self.try_add(&[id.to_string()]).await, Ok(1))
    }

    async fn mark_batch(&self, ids: &[String]) -> usize {
        self.try_add(ids).await.unwrap_or(0)
    }

    async fn count(&self) -> u64 {
        self.try_count().await.unwrap_or(0)
    }

    fn describe(&self) -> String {
        format!("shared set {} at {}", self.key, self.store.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mark_seven_seven_nine() {
        let dedup = SharedDedup::new(Arc::new(MemoryStore::new()), "seen");
        assert!(dedup.mark("7").await);
        assert!(!dedup.mark("7").await);
        assert!(dedup.mark("9").await);
        assert_eq!(dedup.count().await, 2);
        assert!(dedup.seen("9").await);
    }

    #[tokio::test]
    async fn test_sync_reports_new_ids_only() {
        let store = Arc::new(MemoryStore::new());
        let dedup = SharedDedup::new(store.clone(), "seen");
        dedup.mark("3").await;

        let all: Vec<String> = (0..25_000).map(|i| i.to_string()).collect();
        assert_eq!(dedup.sync(&all).await.unwrap(), 24_999);
        assert_eq!(dedup.try_count().await.unwrap(), 25_000);
    }

    #[tokio::test]
    async fn test_offline_store_fails_soft() {
        let store = Arc::new(MemoryStore::new());
        let dedup = SharedDedup::new(store.clone(), "seen");
        store.set_offline(true);

        assert!(!dedup.mark("1").await);
        assert!(!dedup.seen("1").await);
        assert_eq!(dedup.mark_batch(&ids(&["1", "2"])).await, 0);
        assert_eq!(dedup.count().await, 0);
        assert!(dedup.try_count().await.is_err());
    }
}
