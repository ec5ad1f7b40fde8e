//! Upstream fetch module
//!
//! This module handles all HTTP requests to the record API:
//! - Building the HTTP client from `[api]` settings
//! - Issuing one "fetch info" request per numeric ID
//! - Classifying each response as a record, a miss, or a transient failure
//!
//! Failures are values, never panics: the worker counts them toward the
//! controller's error rate and skips the ID.

mod http;

pub use http::HttpFetcher;

use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Transient, countable fetch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Result of fetching one ID
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The upstream returned a record payload
    Found(Value),

    /// Healthy response, but no record exists for this ID
    Missing,

    /// Transient failure; the ID is skipped
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Source of upstream records, one per numeric ID
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch(&self, id: u64) -> FetchOutcome;
}

/// Builds an HTTP client with the configured user agent and timeouts
///
/// # Arguments
///
/// * `config` - The `[api]` configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.max_connections)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a transport error to the transient taxonomy
pub(crate) fn classify_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Other(e.to_string())
    }
}
