//! idcrawl: a fleet-coordinated ID-space crawler
//!
//! This crate enumerates a numeric ID space against a remote HTTP API, fetches
//! one record per ID and persists a unique, append-only dataset. Many worker
//! processes cooperate through a shared store: a queue of ID-range work units,
//! a dedup set of seen record identifiers, and a TTL'd node registry.

pub mod config;
pub mod controller;
pub mod crawler;
pub mod dedup;
pub mod fetch;
pub mod monitor;
pub mod output;
pub mod queue;
pub mod registry;
pub mod store;
pub mod transform;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Invalid work unit: {0}")]
    WorkUnit(#[from] queue::WorkUnitParseError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Shared store unreachable at {url}: {reason}")]
    StoreUnavailable { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Fleet mode requires a [fleet] section (or pass --range for manual-range mode)")]
    MissingFleet,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlMode, CrawlSummary, CrawlWorker, StopReason, WorkerState};
pub use dedup::DedupStore;
pub use queue::{WorkSource, WorkUnit};
