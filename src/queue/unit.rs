use crate::queue::QueueError;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a `"start:end"` work unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkUnitParseError {
    #[error("expected START:END, got '{0}'")]
    Format(String),

    #[error("'{0}' is not a non-negative integer")]
    Number(String),

    #[error("empty range {start}:{end} (start must be below end)")]
    Empty { start: u64, end: u64 },
}

/// A half-open range `[start, end)` of the global ID space
///
/// Serialized on the wire as `"start:end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkUnit {
    pub start: u64,
    pub end: u64,
}

impl WorkUnit {
    /// Creates a unit, enforcing `start < end`
    pub fn new(start: u64, end: u64) -> Result<Self, WorkUnitParseError> {
        if start >= end {
            return Err(WorkUnitParseError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of IDs covered by this unit
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The IDs covered by this unit
    pub fn ids(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for WorkUnit {
    type Err = WorkUnitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| WorkUnitParseError::Format(s.to_string()))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| WorkUnitParseError::Number(part.to_string()))
        };

        WorkUnit::new(parse(start)?, parse(end)?)
    }
}

/// Partitions `[range_start, range_end)` into consecutive units of `chunk_size`
///
/// The last unit is truncated at `range_end`. Units exactly and disjointly
/// cover the range.
pub fn partition(
    range_start: u64,
    range_end: u64,
    chunk_size: u64,
) -> Result<Vec<WorkUnit>, QueueError> {
    if range_start >= range_end {
        return Err(QueueError::InvalidPartition(format!(
            "range_start ({}) must be below range_end ({})",
            range_start, range_end
        )));
    }
    if chunk_size == 0 {
        return Err(QueueError::InvalidPartition(
            "chunk_size must be >= 1".to_string(),
        ));
    }

    let capacity = ((range_end - range_start) / chunk_size + 1) as usize;
    let mut units = Vec::with_capacity(capacity);
    let mut start = range_start;
    while start < range_end {
        let end = start.saturating_add(chunk_size).min(range_end);
        units.push(WorkUnit { start, end });
        start = end;
    }
    Ok(units)
}
