//! Crawler module: the per-node crawl loop
//!
//! This module contains the core crawling logic, including:
//! - The worker state machine (claim, process in rounds, save, drain)
//! - Per-node statistics and the end-of-run report
//! - Mode selection and wiring of the shared or local collaborators

mod coordinator;
mod stats;
mod worker;

pub use coordinator::{
    connect_fleet_store, fleet_deps, manual_deps, run_crawl, CrawlMode, CrawlPlan,
};
pub use stats::{print_summary, NodeStats};
pub use worker::{
    CrawlSummary, CrawlWorker, StopReason, WorkerDeps, WorkerSettings, WorkerState,
};
