//! Shared store trait and error types

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during shared-store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connecting to {endpoint} timed out after {secs}s")]
    ConnectTimeout { endpoint: String, secs: u64 },

    #[error("Store {0} is unavailable")]
    Unavailable(String),

    #[error("Unexpected reply from {endpoint}: {reply}")]
    UnexpectedReply { endpoint: String, reply: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The primitives the fleet needs from its key-value/queue service
///
/// Each call is atomic on its own. Callers must never assume atomicity across
/// two calls.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Human-readable endpoint, safe to log (no credentials)
    fn endpoint(&self) -> String;

    /// Round-trips to the store; used to fail fast at startup
    async fn ping(&self) -> StoreResult<()>;

    // ===== Lists =====

    /// Atomically removes and returns the head of a list
    async fn pop_front(&self, list: &str) -> StoreResult<Option<String>>;

    /// Appends items to the tail of a list
    async fn push_back(&self, list: &str, items: &[String]) -> StoreResult<()>;

    /// Returns the length of a list (0 when absent)
    async fn list_len(&self, list: &str) -> StoreResult<usize>;

    // ===== Sets =====

    /// Adds members to a set, returning how many were not already present
    async fn set_add(&self, set: &str, members: &[String]) -> StoreResult<usize>;

    /// Tests set membership
    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Returns the cardinality of a set (0 when absent)
    async fn set_len(&self, set: &str) -> StoreResult<usize>;

    // ===== Hashes =====

    /// Sets one field and refreshes the whole hash's time-to-live
    async fn hash_upsert_with_ttl(
        &self,
        hash: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Returns every field of a hash (empty when absent or expired)
    async fn hash_get_all(&self, hash: &str) -> StoreResult<HashMap<String, String>>;

    // ===== Keys =====

    /// Deletes a key of any type
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
