//! Shared store module for fleet coordination
//!
//! Every cross-node mutation goes through one of five atomic primitives:
//! pop-from-list, push-to-list, add-to-set, set-membership test and
//! upsert-with-TTL on a hash map. No operation spans more than one primitive,
//! and no node holds a lock across calls.
//!
//! Two backends share the [`SharedStore`] contract:
//! - [`RedisStore`]: the fleet backend, lazily (re)connecting on every call
//! - [`MemoryStore`]: a process-local backend with identical semantics

mod memory;
mod redis_store;
mod traits;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{SharedStore, StoreError, StoreResult};

use crate::config::FleetConfig;
use std::sync::Arc;
use std::time::Duration;

/// Opens the fleet store described by the configuration
///
/// The connection itself is established lazily; call [`SharedStore::ping`]
/// to fail fast at startup.
pub fn open_fleet_store(config: &FleetConfig) -> StoreResult<Arc<dyn SharedStore>> {
    let store = RedisStore::new(
        &config.redis_url,
        Duration::from_secs(config.connect_timeout_secs),
    )?;
    Ok(Arc::new(store))
}
