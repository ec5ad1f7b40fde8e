//! Record transform module
//!
//! Turns a fetched payload into one flat [`OutputRecord`]. The crawler treats
//! the transform as an opaque collaborator: it only needs the column schema,
//! the record identifier used for dedup, and the row itself.

mod product;

pub use product::{ProductTransform, PRODUCT_COLUMNS};

use serde_json::Value;

/// A transformed, flattened record ready to be written as one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    /// Dedup key; first-seen wins across the fleet
    pub identifier: String,

    /// Column values, in the order of [`RecordTransform::headers`]
    pub fields: Vec<String>,
}

/// Maps upstream payloads to output rows
pub trait RecordTransform: Send + Sync {
    /// The fixed, ordered column schema
    fn headers(&self) -> &[&'static str];

    /// Extracts the record identifier without building the whole row
    fn identifier(&self, id: u64, payload: &Value) -> String;

    /// Builds the output row for a first-seen record
    fn transform(&self, id: u64, payload: &Value) -> OutputRecord;
}
