//! WorkUnit queue module
//!
//! The global ID range is partitioned once into fixed-size, non-overlapping
//! work units. Workers claim units from a [`WorkSource`]:
//! - [`SharedQueue`]: a durable FIFO in the shared store (fleet mode)
//! - [`RangeSource`]: units generated locally from a bounded range (manual-range mode)

mod source;
mod unit;

pub use source::{RangeSource, SharedQueue, WorkSource, INIT_PUSH_BATCH};
pub use unit::{partition, WorkUnit, WorkUnitParseError};

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur while managing the work queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue {key} already holds {len} units; clear it first to reinitialize")]
    NotEmpty { key: String, len: usize },

    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
