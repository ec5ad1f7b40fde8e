use serde::Deserialize;

/// Main configuration structure for idcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub fleet: Option<FleetConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Upstream API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// The per-identifier "fetch info" endpoint
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query parameter carrying the numeric ID
    #[serde(rename = "id-param", default = "default_id_param")]
    pub id_param: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Hard cap on simultaneous upstream connections
    #[serde(rename = "max-connections", default = "default_max_connections")]
    pub max_connections: usize,

    /// User-Agent header sent upstream
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// ID-space and worker behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// First ID of the global range (inclusive)
    #[serde(rename = "range-start")]
    pub range_start: u64,

    /// End of the global range (exclusive)
    #[serde(rename = "range-end")]
    pub range_end: u64,

    /// Number of IDs per work unit
    #[serde(rename = "chunk-size")]
    pub chunk_size: u64,

    /// Delay before re-polling an empty queue (seconds)
    #[serde(rename = "empty-queue-wait-secs", default = "default_empty_queue_wait")]
    pub empty_queue_wait_secs: u64,

    /// Flush the local buffer once it holds this many records
    #[serde(rename = "save-interval", default = "default_save_interval")]
    pub save_interval: usize,

    /// Stop once this fraction of recent records were duplicates
    #[serde(rename = "max-duplicate-ratio", default)]
    pub max_duplicate_ratio: Option<f64>,

    /// Number of recent fetched records the dup ratio is measured over
    #[serde(rename = "duplicate-window", default = "default_duplicate_window")]
    pub duplicate_window: usize,

    /// Stop once this node has persisted this many unique records
    #[serde(rename = "target-unique", default)]
    pub target_unique: Option<u64>,
}

/// Adaptive fetch controller tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(rename = "initial-batch-size")]
    pub initial_batch_size: usize,

    #[serde(rename = "min-batch-size")]
    pub min_batch_size: usize,

    #[serde(rename = "max-batch-size")]
    pub max_batch_size: usize,

    /// Number of recent latencies kept in the sliding window
    #[serde(rename = "latency-window")]
    pub latency_window: usize,

    /// Average latency above which the batch shrinks (milliseconds)
    #[serde(rename = "throttle-latency-ms")]
    pub throttle_latency_ms: u64,

    /// Average latency below which the batch may grow (milliseconds)
    #[serde(rename = "comfortable-latency-ms")]
    pub comfortable_latency_ms: u64,

    /// Error rate above which the batch shrinks
    #[serde(rename = "error-rate-threshold")]
    pub error_rate_threshold: f64,

    /// Error rate below which the batch may grow
    #[serde(rename = "low-error-rate")]
    pub low_error_rate: f64,

    /// Samples required before the error rate is trusted
    #[serde(rename = "min-samples")]
    pub min_samples: u64,

    /// Success/error counters reset once their sum exceeds this
    #[serde(rename = "counter-reset")]
    pub counter_reset: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 50,
            min_batch_size: 5,
            max_batch_size: 100,
            latency_window: 50,
            throttle_latency_ms: 2_000,
            comfortable_latency_ms: 500,
            error_rate_threshold: 0.10,
            low_error_rate: 0.02,
            min_samples: 20,
            counter_reset: 200,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the append-only CSV dataset
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// Path to the seen-identifier recovery file
    #[serde(rename = "seen-ids-path")]
    pub seen_ids_path: String,
}

/// Shared-store (fleet mode) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    #[serde(rename = "redis-url")]
    pub redis_url: String,

    /// Stable node identity; derived from the hostname when absent
    #[serde(rename = "node-id", default)]
    pub node_id: Option<String>,

    #[serde(rename = "queue-key", default = "default_queue_key")]
    pub queue_key: String,

    #[serde(rename = "seen-key", default = "default_seen_key")]
    pub seen_key: String,

    #[serde(rename = "nodes-key", default = "default_nodes_key")]
    pub nodes_key: String,

    /// Registry entries expire this long after the last heartbeat (seconds)
    #[serde(rename = "node-ttl-secs", default = "default_node_ttl")]
    pub node_ttl_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_store_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl FleetConfig {
    /// Creates a fleet section for the given store URL with default keys
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            node_id: None,
            queue_key: default_queue_key(),
            seen_key: default_seen_key(),
            nodes_key: default_nodes_key(),
            node_ttl_secs: default_node_ttl(),
            connect_timeout_secs: default_store_connect_timeout(),
        }
    }
}

/// Fleet monitor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(rename = "refresh-secs")]
    pub refresh_secs: u64,

    /// Nodes updated within this window are active
    #[serde(rename = "active-secs")]
    pub active_secs: u64,

    /// Nodes updated within this window (but not active) are stale
    #[serde(rename = "stale-secs")]
    pub stale_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 5,
            active_secs: 30,
            stale_secs: 60,
        }
    }
}

fn default_id_param() -> String {
    "id".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_connections() -> usize {
    100
}

fn default_user_agent() -> String {
    format!("idcrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_empty_queue_wait() -> u64 {
    10
}

fn default_save_interval() -> usize {
    500
}

fn default_duplicate_window() -> usize {
    1_000
}

fn default_queue_key() -> String {
    "crawler:queue".to_string()
}

fn default_seen_key() -> String {
    "crawler:seen_ids".to_string()
}

fn default_nodes_key() -> String {
    "crawler:nodes".to_string()
}

fn default_node_ttl() -> u64 {
    300
}

fn default_store_connect_timeout() -> u64 {
    15
}
