//! Redis-backed shared store
//!
//! The connection is established on first use and dropped on any error; the
//! next call reconnects. Callers above this layer decide whether a failure is
//! fatal (startup) or degrades gracefully (queue/dedup/registry).

use crate::store::traits::{SharedStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared store backed by a Redis server
pub struct RedisStore {
    client: redis::Client,
    endpoint: String,
    connect_timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Creates a store for the given `redis://` URL without connecting
    pub fn new(url: &str, connect_timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            endpoint: redact_endpoint(url),
            connect_timeout,
            connection: Mutex::new(None),
        })
    }

    /// Whether a live connection is currently cached
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Returns the cached connection, establishing one if needed
    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::ConnectTimeout {
            endpoint: self.endpoint.clone(),
            secs: self.connect_timeout.as_secs(),
        })??;

        tracing::info!("Connected to shared store at {}", self.endpoint);
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Runs one command, dropping the cached connection if it fails
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> StoreResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match command(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    "Shared store {} failed at {}: {}; marking disconnected",
                    op,
                    self.endpoint,
                    e
                );
                *self.connection.lock().await = None;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn ping(&self) -> StoreResult<()> {
        let reply: String = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async::<_, String>(&mut conn).await
            })
            .await?;

        if reply != "PONG" {
            return Err(StoreError::UnexpectedReply {
                endpoint: self.endpoint.clone(),
                reply,
            });
        }
        Ok(())
    }

    async fn pop_front(&self, list: &str) -> StoreResult<Option<String>> {
        self.run("LPOP", |mut conn| async move { conn.lpop(list, None).await })
            .await
    }

    async fn push_back(&self, list: &str, items: &[String]) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.run("RPUSH", |mut conn| async move {
            conn.rpush::<_, _, ()>(list, items).await
        })
        .await
    }

    async fn list_len(&self, list: &str) -> StoreResult<usize> {
        self.run("LLEN", |mut conn| async move { conn.llen(list).await })
            .await
    }

    async fn set_add(&self, set: &str, members: &[String]) -> StoreResult<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        self.run("SADD", |mut conn| async move { conn.sadd(set, members).await })
            .await
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        self.run("SISMEMBER", |mut conn| async move {
            conn.sismember(set, member).await
        })
        .await
    }

    async fn set_len(&self, set: &str) -> StoreResult<usize> {
        self.run("SCARD", |mut conn| async move { conn.scard(set).await })
            .await
    }

    async fn hash_upsert_with_ttl(
        &self,
        hash: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        let ttl_secs = ttl.as_secs().max(1) as i64;
        self.run("HSET+EXPIRE", |mut conn| async move {
            redis::pipe()
                .atomic()
                .hset(hash, field, value)
                .ignore()
                .expire(hash, ttl_secs)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn hash_get_all(&self, hash: &str) -> StoreResult<HashMap<String, String>> {
        self.run("HGETALL", |mut conn| async move { conn.hgetall(hash).await })
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.run("DEL", |mut conn| async move {
            conn.del::<_, ()>(key).await
        })
        .await
    }
}

/// Strips credentials from a store URL for logging
fn redact_endpoint(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("localhost");
            let port = parsed.port().unwrap_or(6379);
            let db = parsed.path().trim_start_matches('/');
            if db.is_empty() {
                format!("{}:{}", host, port)
            } else {
                format!("{}:{}/{}", host, port, db)
            }
        }
        Err(_) => "<invalid redis url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_endpoint_hides_password() {
        assert_eq!(
            redact_endpoint("redis://:s3cret@cache.internal:6380/2"),
            "cache.internal:6380/2"
        );
        assert_eq!(redact_endpoint("redis://127.0.0.1"), "127.0.0.1:6379");
    }

    #[test]
    fn test_new_does_not_connect() {
        let store = RedisStore::new("redis://127.0.0.1:1/0", Duration::from_millis(50)).unwrap();
        assert_eq!(store.endpoint(), "127.0.0.1:1/0");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_soft_and_stays_disconnected() {
        // Port 1 is never a Redis server; the call must error, not panic.
        let store = RedisStore::new("redis://127.0.0.1:1/0", Duration::from_millis(200)).unwrap();
        assert!(store.pop_front("crawler:queue").await.is_err());
        assert!(!store.is_connected().await);
        assert!(store.ping().await.is_err());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RedisStore::new("not-a-url", Duration::from_secs(1)).is_err());
    }
}
