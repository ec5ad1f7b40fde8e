//! Per-node crawl statistics
//!
//! Counters behind the heartbeat, the auto-stop checks and the end-of-run
//! report.

use crate::crawler::CrawlSummary;
use crate::registry::{now_epoch_secs, NodeStatus};
use crate::WorkUnit;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Running counters for one worker
#[derive(Debug, Clone)]
pub struct NodeStats {
    started: Instant,
    pub requests: u64,
    pub errors: u64,
    pub misses: u64,
    pub duplicates: u64,
    pub unique: u64,
    pub units_completed: u64,
    recent: VecDeque<bool>,
    recent_duplicates: usize,
    window: usize,
}

impl NodeStats {
    /// Creates counters whose dup ratio spans the last `window` fetched records
    pub fn new(window: usize) -> Self {
        Self {
            started: Instant::now(),
            requests: 0,
            errors: 0,
            misses: 0,
            duplicates: 0,
            unique: 0,
            units_completed: 0,
            recent: VecDeque::with_capacity(window),
            recent_duplicates: 0,
            window: window.max(1),
        }
    }

    pub fn record_error(&mut self) {
        self.requests += 1;
        self.errors += 1;
    }

    pub fn record_miss(&mut self) {
        self.requests += 1;
        self.misses += 1;
    }

    /// Counts a fetched record, first-seen or duplicate
    pub fn record_found(&mut self, duplicate: bool) {
        self.requests += 1;
        if duplicate {
            self.duplicates += 1;
        } else {
            self.unique += 1;
        }

        if self.recent.len() == self.window && self.recent.pop_front() == Some(true) {
            self.recent_duplicates -= 1;
        }
        self.recent.push_back(duplicate);
        if duplicate {
            self.recent_duplicates += 1;
        }
    }

    /// Fraction of the recent window that were duplicates
    pub fn dup_ratio(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent_duplicates as f64 / self.recent.len() as f64
    }

    /// Whether the dup ratio covers a full window
    pub fn window_full(&self) -> bool {
        self.recent.len() >= self.window
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Unique records per second since start
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.unique as f64 / secs
        } else {
            0.0
        }
    }

    /// Snapshot for the node registry
    pub fn to_status(
        &self,
        node_id: &str,
        batch_size: usize,
        current_unit: Option<WorkUnit>,
    ) -> NodeStatus {
        NodeStatus {
            node_id: node_id.to_string(),
            unique_count: self.unique,
            rate: self.rate(),
            dup_ratio: self.dup_ratio(),
            batch_size,
            elapsed: self.elapsed().as_secs_f64(),
            last_update: now_epoch_secs(),
            requests: self.requests,
            errors: self.errors,
            current_unit: current_unit.map(|unit| unit.to_string()),
        }
    }
}

/// Prints an end-of-run report to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ({}) ===\n", summary.node_id);

    println!("Outcome:");
    println!("  Stopped: {}", summary.reason);
    println!("  Final state: {:?}", summary.final_state);
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Work:");
    println!("  Units completed: {}", summary.units_completed);
    println!("  Requests: {}", summary.requests);
    println!("  Errors: {}", summary.errors);
    println!("  Misses: {}", summary.misses);
    println!("  Final batch size: {}", summary.batch_size);
    println!();

    let fetched = summary.unique + summary.duplicates;
    let dup_pct = if fetched > 0 {
        (summary.duplicates as f64 / fetched as f64) * 100.0
    } else {
        0.0
    };
    println!("Records:");
    println!("  Unique: {}", summary.unique);
    println!("  Duplicates: {} ({:.1}%)", summary.duplicates, dup_pct);
    println!("  Written: {}", summary.flushed);

    if summary.unflushed > 0 {
        println!();
        println!(
            "WARNING: {} records could not be written; see the log for the I/O error",
            summary.unflushed
        );
    }
}
