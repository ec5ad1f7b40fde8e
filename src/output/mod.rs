//! Local persistence module
//!
//! This module handles:
//! - Appending records to the quoted CSV dataset ([`RecordWriter`])
//! - The seen-identifier recovery file ([`SeenLog`])
//! - The per-node write buffer and its flush policy ([`LocalPersistence`])
//! - Offline maintenance: compaction and identifier extraction

mod compact;
mod persistence;
mod seen_log;
mod writer;

pub use compact::{
    compact_output, distinct_identifiers, read_identifiers, CompactReport, ID_COLUMN,
};
pub use persistence::LocalPersistence;
pub use seen_log::SeenLog;
pub use writer::RecordWriter;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
