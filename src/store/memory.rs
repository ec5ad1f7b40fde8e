//! In-process shared store
//!
//! Mirrors the Redis semantics the fleet relies on (FIFO lists, sets with
//! first-add reporting, hashes whose TTL is refreshed on every upsert), so
//! that several workers in one process can coordinate exactly like a fleet.

use crate::store::traits::{SharedStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct ExpiringHash {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl ExpiringHash {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, ExpiringHash>,
}

/// Shared store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (or regaining) the connection to the store
    ///
    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns a snapshot of a list's contents
    pub async fn list_items(&self, list: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .lists
            .get(list)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(self.endpoint()));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    fn endpoint(&self) -> String {
        "memory".to_string()
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_online()
    }

    async fn pop_front(&self, list: &str) -> StoreResult<Option<String>> {
        self.check_online()?;
        let mut state = self.state.lock().await;
        let item = state.lists.get_mut(list).and_then(|items| items.pop_front());
        if state.lists.get(list).map(|items| items.is_empty()).unwrap_or(false) {
            state.lists.remove(list);
        }
        Ok(item)
    }

    async fn push_back(&self, list: &str, items: &[String]) -> StoreResult<()> {
        self.check_online()?;
        if items.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        state
            .lists
            .entry(list.to_string())
            .or_default()
            .extend(items.iter().cloned());
        Ok(())
    }

    async fn list_len(&self, list: &str) -> StoreResult<usize> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.lists.get(list).map(|items| items.len()).unwrap_or(0))
    }

    async fn set_add(&self, set: &str, members: &[String]) -> StoreResult<usize> {
        self.check_online()?;
        let mut state = self.state.lock().await;
        let entry = state.sets.entry(set.to_string()).or_default();
        Ok(members
            .iter()
            .filter(|member| entry.insert((*member).clone()))
            .count())
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state
            .sets
            .get(set)
            .map(|members| members.contains(member))
            .unwrap_or(false))
    }

    async fn set_len(&self, set: &str) -> StoreResult<usize> {
        self.check_online()?;
        let state = self.state.lock().await;
        Ok(state.sets.get(set).map(|members| members.len()).unwrap_or(0))
    }

    async fn hash_upsert_with_ttl(
        &self,
        hash: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let entry = state.hashes.entry(hash.to_string()).or_default();
        if entry.is_expired(now) {
            entry.fields.clear();
        }
        entry.fields.insert(field.to_string(), value.to_string());
        entry.expires_at = Some(now + ttl);
        Ok(())
    }

    async fn hash_get_all(&self, hash: &str) -> StoreResult<HashMap<String, String>> {
        self.check_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let expired = state
            .hashes
            .get(hash)
            .map(|entry| entry.is_expired(now))
            .unwrap_or(false);
        if expired {
            state.hashes.remove(hash);
            return Ok(HashMap::new());
        }
        Ok(state
            .hashes
            .get(hash)
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_online()?;
        let mut state = self.state.lock().await;
        state.lists.remove(key);
        state.sets.remove(key);
        state.hashes.remove(key);
        Ok(())
    }
}
