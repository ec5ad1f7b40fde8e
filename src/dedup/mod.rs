//! Dedup store module
//!
//! Tracks which record identifiers have already been persisted. Every worker
//! checks and marks an identifier here before buffering its record, which is
//! what makes persisted records unique across the fleet.
//!
//! Three variants share the [`DedupStore`] contract:
//! - [`LocalDedup`]: an in-memory set (manual-range mode, and the local mirror)
//! - [`SharedDedup`]: the fleet-wide set in the shared store
//! - [`FleetDedup`]: local mirror first, shared set authoritative

mod fleet;
mod local;
mod shared;

pub use fleet::FleetDedup;
pub use local::LocalDedup;
pub use shared::{SharedDedup, SYNC_BATCH};

use async_trait::async_trait;

/// Set of previously seen record identifiers
///
/// None of these calls fail: backends that lose their connection degrade
/// rather than abort the crawl.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether the identifier has been marked before
    async fn seen(&self, id: &str) -> bool;

    /// Marks an identifier, returning true only if this call added it
    async fn mark(&self, id: &str) -> bool;

    /// Marks many identifiers, returning how many were newly added
    async fn mark_batch(&self, ids: &[String]) -> usize;

    /// Number of identifiers known to the store
    async fn count(&self) -> u64;

    /// Short label for logs
    fn describe(&self) -> String;
}
