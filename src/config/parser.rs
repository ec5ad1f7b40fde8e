use crate::config::types::{Config, FleetConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding the node identity
pub const NODE_ID_ENV: &str = "CRAWLER_NODE_ID";

/// Environment variable overriding the shared store URL
pub const REDIS_URL_ENV: &str = "CRAWLER_REDIS_URL";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides (`CRAWLER_NODE_ID`, `CRAWLER_REDIS_URL`) are applied
/// before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use idcrawl::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Chunk size: {}", config.crawl.chunk_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate(&config)?;

    Ok(config)
}

/// Applies environment overrides using the given lookup
///
/// A Redis URL override creates a `[fleet]` section with default keys when
/// the file has none.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(REDIS_URL_ENV).filter(|v| !v.is_empty()) {
        match config.fleet.as_mut() {
            Some(fleet) => fleet.redis_url = url,
            None => config.fleet = Some(FleetConfig::new(url)),
        }
    }

    if let Some(node_id) = lookup(NODE_ID_ENV).filter(|v| !v.is_empty()) {
        if let Some(fleet) = config.fleet.as_mut() {
            fleet.node_id = Some(node_id);
        }
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so operators can tell which config a node ran with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Resolves the node identity for this process
///
/// Uses the configured ID when present, otherwise derives a stable one from
/// the hostname so restarts keep the same registry entry.
pub fn resolve_node_id(fleet: Option<&FleetConfig>) -> String {
    if let Some(id) = fleet.and_then(|f| f.node_id.clone()) {
        return id;
    }
    stable_node_id(&local_hostname())
}

/// Derives `node-<host prefix>-<hash prefix>` from a hostname
pub fn stable_node_id(hostname: &str) -> String {
    let digest = hex::encode(Sha256::digest(hostname.as_bytes()));
    let prefix: String = hostname.chars().take(12).collect();
    format!("node-{}-{}", prefix, &digest[..8])
}

fn local_hostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
