use serde::{Deserialize, Serialize};
use std::fmt;

/// One node's self-reported progress, as stored in the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,

    /// Unique records persisted by this node
    pub unique_count: u64,

    /// Unique records per second since start
    pub rate: f64,

    /// Fraction of recently fetched records that were duplicates
    pub dup_ratio: f64,

    /// Current round size chosen by the adaptive controller
    pub batch_size: usize,

    /// Seconds since the node started crawling
    pub elapsed: f64,

    /// Unix time of this report, in seconds
    pub last_update: f64,

    #[serde(default)]
    pub requests: u64,

    #[serde(default)]
    pub errors: u64,

    /// The unit being processed, as `"start:end"`
    #[serde(default)]
    pub current_unit: Option<String>,
}

impl NodeStatus {
    /// Seconds since this status was reported
    pub fn age_secs(&self, now: f64) -> f64 {
        (now - self.last_update).max(0.0)
    }
}

/// Current Unix time in fractional seconds
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Read-time classification of a node's freshness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Active,
    Stale,
    Offline,
}

impl Liveness {
    /// Classifies a status by its age against the two windows
    pub fn classify(age_secs: f64, active_secs: u64, stale_secs: u64) -> Self {
        if age_secs <= active_secs as f64 {
            Liveness::Active
        } else if age_secs <= stale_secs as f64 {
            Liveness::Stale
        } else {
            Liveness::Offline
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Liveness::Active => "active",
            Liveness::Stale => "stale",
            Liveness::Offline => "offline",
        };
        f.write_str(label)
    }
}
