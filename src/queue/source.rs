//! Work sources: where a worker gets its next unit from

use crate::queue::unit::{partition, WorkUnit};
use crate::queue::QueueError;
use crate::store::{SharedStore, StoreResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Units are pushed to the shared queue in batches of this size
pub const INIT_PUSH_BATCH: usize = 1_000;

/// A supplier of work units
///
/// `claim` never fails: an unreachable backend looks like an empty queue, and
/// `release` on an unreachable backend is a logged no-op.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Pops the next unit, if any
    async fn claim(&self) -> Option<WorkUnit>;

    /// Returns an unfinished unit to the tail of the queue
    async fn release(&self, unit: WorkUnit);

    /// Whether other nodes may add work behind our back
    ///
    /// Shared sources are re-polled once after a delay before the worker
    /// concludes the crawl is drained.
    fn is_shared(&self) -> bool;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// The fleet-wide FIFO of work units held in the shared store
pub struct SharedQueue {
    store: Arc<dyn SharedStore>,
    key: String,
}

impl SharedQueue {
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The store key of the list
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of units currently waiting in the queue
    pub async fn len(&self) -> StoreResult<usize> {
        self.store.list_len(&self.key).await
    }

    /// Partitions the range and loads the units into the queue
    ///
    /// Refuses to touch a non-empty queue unless `clear` is set, so a second
    /// operator run cannot duplicate outstanding work.
    ///
    /// # Returns
    ///
    /// The number of units pushed
    pub async fn initialize(
        &self,
        range_start: u64,
        range_end: u64,
        chunk_size: u64,
        clear: bool,
    ) -> Result<usize, QueueError> {
        let units = partition(range_start, range_end, chunk_size)?;

        let current = self.store.list_len(&self.key).await?;
        if current > 0 {
            if !clear {
                return Err(QueueError::NotEmpty {
                    key: self.key.clone(),
                    len: current,
                });
            }
            tracing::warn!("Clearing {} queued units from {}", current, self.key);
            self.store.delete(&self.key).await?;
        }

        tracing::info!(
            "Loading {} units covering [{}, {}) in chunks of {}",
            units.len(),
            range_start,
            range_end,
            chunk_size
        );

        let mut pushed = 0;
        for batch in units.chunks(INIT_PUSH_BATCH) {
            let wire: Vec<String> = batch.iter().map(WorkUnit::to_string).collect();
            self.store.push_back(&self.key, &wire).await?;
            pushed += batch.len();
            tracing::debug!("Pushed {}/{} units", pushed, units.len());
        }

        Ok(pushed)
    }
}

#[async_trait]
impl WorkSource for SharedQueue {
    async fn claim(&self) -> Option<WorkUnit> {
        loop {
            let raw = match self.store.pop_front(&self.key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(
                        "Queue claim from {} ({}) failed: {}",
                        self.key,
                        self.store.endpoint(),
                        e
                    );
                    return None;
                }
            };

            match raw.parse::<WorkUnit>() {
                Ok(unit) => return Some(unit),
                // Never requeued, so a poison entry cannot loop through the fleet.
                Err(e) => tracing::error!("Discarding malformed work unit '{}': {}", raw, e),
            }
        }
    }

    async fn release(&self, unit: WorkUnit) {
        if let Err(e) = self.store.push_back(&self.key, &[unit.to_string()]).await {
            tracing::error!(
                "Queue release of {} to {} ({}) failed: {}",
                unit,
                self.key,
                self.store.endpoint(),
                e
            );
        }
    }

    fn is_shared(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("shared queue {} at {}", self.key, self.store.endpoint())
    }
}

/// Units generated locally from an operator-supplied range
///
/// Used in manual-range mode; nothing is ever returned to a shared queue.
pub struct RangeSource {
    units: Mutex<VecDeque<WorkUnit>>,
    label: String,
}

impl RangeSource {
    pub fn new(range_start: u64, range_end: u64, chunk_size: u64) -> Result<Self, QueueError> {
        let units = partition(range_start, range_end, chunk_size)?;
        Ok(Self {
            units: Mutex::new(units.into()),
            label: format!("manual range {}:{}", range_start, range_end),
        })
    }

    /// Number of units not yet claimed
    pub async fn remaining(&self) -> usize {
        self.units.lock().await.len()
    }
}

#[async_trait]
impl WorkSource for RangeSource {
    async fn claim(&self) -> Option<WorkUnit> {
        self.units.lock().await.pop_front()
    }

    async fn release(&self, unit: WorkUnit) {
        tracing::debug!("Returning {} to the local range", unit);
        self.units.lock().await.push_back(unit);
    }

    fn is_shared(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
