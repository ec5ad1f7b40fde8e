use crate::dedup::DedupStore;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Process-local dedup set
#[derive(Debug, Default)]
pub struct LocalDedup {
    ids: Mutex<HashSet<String>>,
}

impl LocalDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the set, typically from the seen-IDs recovery file
    pub fn from_ids(ids: HashSet<String>) -> Self {
        Self {
            ids: Mutex::new(ids),
        }
    }
}

#[async_trait]
impl DedupStore for LocalDedup {
    async fn seen(&self, id: &str) -> bool {
        self.ids.lock().await.contains(id)
    }

    async fn mark(&self, id: &str) -> bool {
        self.ids.lock().await.insert(id.to_string())
    }

    async fn mark_batch(&self, ids: &[String]) -> usize {
        let mut set = self.ids.lock().await;
        ids.iter().filter(|id| set.insert((*id).clone())).count()
    }

    async fn count(&self) -> u64 {
        self.ids.lock().await.len() as u64
    }

    fn describe(&self) -> String {
        "local set".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_is_idempotent() {
        let dedup = LocalDedup::new();
        assert!(dedup.mark("7").await);
        assert!(!dedup.mark("7").await);
        assert!(dedup.mark("9").await);

        assert_eq!(dedup.count().await, 2);
        assert!(dedup.seen("7").await);
        assert!(!dedup.seen("8").await);
    }

    #[tokio::test]
    async fn test_seeded_ids_are_seen() {
        let seed: HashSet<String> = ["1", "2"].iter().map(|s| s.to_string()).collect();
        let dedup = LocalDedup::from_ids(seed);

        assert!(dedup.seen("2").await);
        assert!(!dedup.mark("1").await);

        let batch: Vec<String> = ["2", "3", "3", "4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedup.mark_batch(&batch).await, 2);
        assert_eq!(dedup.count().await, 4);
    }
}
