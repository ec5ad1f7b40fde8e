//! Configuration module for idcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the environment overrides and node identity used in fleet mode.
//!
//! # Example
//!
//! ```no_run
//! use idcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawling [{}, {})", config.crawl.range_start, config.crawl.range_end);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, ControllerConfig, CrawlConfig, FleetConfig, MonitorConfig, OutputConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    resolve_node_id, stable_node_id, NODE_ID_ENV, REDIS_URL_ENV,
};
