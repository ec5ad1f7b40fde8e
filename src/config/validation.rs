use crate::config::types::{ApiConfig, Config, ControllerConfig, CrawlConfig, FleetConfig, MonitorConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawl_config(&config.crawl)?;
    validate_controller_config(&config.controller)?;
    validate_output_config(&config.output)?;
    if let Some(fleet) = &config.fleet {
        validate_fleet_config(fleet)?;
    }
    validate_monitor_config(&config.monitor)?;
    Ok(())
}

/// Validates upstream API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.id_param.is_empty() {
        return Err(ConfigError::Validation("id_param cannot be empty".to_string()));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_connections < 1 || config.max_connections > 1_000 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be between 1 and 1000, got {}",
            config.max_connections
        )));
    }

    Ok(())
}

/// Validates the ID range and worker behavior
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.range_start >= config.range_end {
        return Err(ConfigError::Validation(format!(
            "range_start ({}) must be below range_end ({})",
            config.range_start, config.range_end
        )));
    }

    if config.chunk_size == 0 {
        return Err(ConfigError::Validation("chunk_size must be >= 1".to_string()));
    }

    if config.save_interval == 0 {
        return Err(ConfigError::Validation(
            "save_interval must be >= 1".to_string(),
        ));
    }

    if let Some(ratio) = config.max_duplicate_ratio {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "max_duplicate_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        if config.duplicate_window == 0 {
            return Err(ConfigError::Validation(
                "duplicate_window must be >= 1 when max_duplicate_ratio is set".to_string(),
            ));
        }
    }

    if config.target_unique == Some(0) {
        return Err(ConfigError::Validation(
            "target_unique must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates adaptive controller bounds and thresholds
fn validate_controller_config(config: &ControllerConfig) -> Result<(), ConfigError> {
    if config.min_batch_size < 1 {
        return Err(ConfigError::Validation(
            "min_batch_size must be >= 1".to_string(),
        ));
    }

    if config.min_batch_size > config.max_batch_size {
        return Err(ConfigError::Validation(format!(
            "min_batch_size ({}) cannot exceed max_batch_size ({})",
            config.min_batch_size, config.max_batch_size
        )));
    }

    if config.initial_batch_size < config.min_batch_size
        || config.initial_batch_size > config.max_batch_size
    {
        return Err(ConfigError::Validation(format!(
            "initial_batch_size must be between {} and {}, got {}",
            config.min_batch_size, config.max_batch_size, config.initial_batch_size
        )));
    }

    if config.latency_window == 0 {
        return Err(ConfigError::Validation(
            "latency_window must be >= 1".to_string(),
        ));
    }

    // Growth must require strictly better conditions than shrinking does.
    if config.comfortable_latency_ms >= config.throttle_latency_ms {
        return Err(ConfigError::Validation(format!(
            "comfortable_latency_ms ({}) must be below throttle_latency_ms ({})",
            config.comfortable_latency_ms, config.throttle_latency_ms
        )));
    }

    if config.low_error_rate >= config.error_rate_threshold {
        return Err(ConfigError::Validation(format!(
            "low_error_rate ({}) must be below error_rate_threshold ({})",
            config.low_error_rate, config.error_rate_threshold
        )));
    }

    if config.counter_reset < config.min_samples {
        return Err(ConfigError::Validation(format!(
            "counter_reset ({}) must be >= min_samples ({})",
            config.counter_reset, config.min_samples
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records_path cannot be empty".to_string(),
        ));
    }

    if config.seen_ids_path.is_empty() {
        return Err(ConfigError::Validation(
            "seen_ids_path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.seen_ids_path {
        return Err(ConfigError::Validation(
            "records_path and seen_ids_path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates shared-store configuration
fn validate_fleet_config(config: &FleetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.redis_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis_url: {}", e)))?;

    if url.scheme() != "redis" && url.scheme() != "rediss" {
        return Err(ConfigError::InvalidUrl(format!(
            "redis_url must use redis:// or rediss://, got '{}'",
            config.redis_url
        )));
    }

    for (name, key) in [
        ("queue_key", &config.queue_key),
        ("seen_key", &config.seen_key),
        ("nodes_key", &config.nodes_key),
    ] {
        if key.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.node_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "node_ttl_secs must be >= 1".to_string(),
        ));
    }

    if let Some(node_id) = &config.node_id {
        validate_node_id(node_id)?;
    }

    Ok(())
}

/// Validates monitor windows
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    if config.refresh_secs == 0 {
        return Err(ConfigError::Validation(
            "refresh_secs must be >= 1".to_string(),
        ));
    }

    if config.active_secs >= config.stale_secs {
        return Err(ConfigError::Validation(format!(
            "active_secs ({}) must be below stale_secs ({})",
            config.active_secs, config.stale_secs
        )));
    }

    Ok(())
}

/// Node IDs become hash fields in the registry; keep them printable
fn validate_node_id(node_id: &str) -> Result<(), ConfigError> {
    if node_id.is_empty() {
        return Err(ConfigError::Validation("node_id cannot be empty".to_string()));
    }

    if !node_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "node_id must contain only alphanumerics, '-', '_' or '.', got '{}'",
            node_id
        )));
    }

    Ok(())
}
