use crate::output::{OutputResult, RecordWriter, SeenLog};
use crate::transform::OutputRecord;

/// Per-node write buffer in front of the dataset and the seen log
///
/// Records are appended to the dataset first, then their identifiers to the
/// seen log. If a flush fails, whatever was not yet written stays buffered and
/// is retried by the next flush; nothing is dropped.
#[derive(Debug)]
pub struct LocalPersistence {
    writer: RecordWriter,
    seen_log: SeenLog,
    buffer: Vec<OutputRecord>,
    pending_ids: Vec<String>,
    flushed: u64,
}

impl LocalPersistence {
    pub fn new(writer: RecordWriter, seen_log: SeenLog) -> Self {
        Self {
            writer,
            seen_log,
            buffer: Vec::new(),
            pending_ids: Vec::new(),
            flushed: 0,
        }
    }

    pub fn seen_log(&self) -> &SeenLog {
        &self.seen_log
    }

    /// Adds a first-seen record to the buffer
    pub fn push(&mut self, record: OutputRecord) {
        self.buffer.push(record);
    }

    /// Records waiting to be written to the dataset
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total records written to the dataset by this instance
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    /// Writes buffered records, then their identifiers
    ///
    /// # Returns
    ///
    /// The number of records written to the dataset by this call
    pub fn flush(&mut self) -> OutputResult<usize> {
        let mut written = 0;
        if !self.buffer.is_empty() {
            written = self.writer.append(&self.buffer)?;
            self.pending_ids
                .extend(self.buffer.drain(..).map(|record| record.identifier));
            self.flushed += written as u64;
        }

        if !self.pending_ids.is_empty() {
            self.seen_log.append(&self.pending_ids)?;
            self.pending_ids.clear();
        }

        if written > 0 {
            tracing::debug!(
                "Flushed {} records to {}",
                written,
                self.writer.path().display()
            );
        }
        Ok(written)
    }
}
