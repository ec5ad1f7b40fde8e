use crate::output::{OutputError, OutputResult};
use crate::transform::OutputRecord;
use csv::{QuoteStyle, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Append-only CSV dataset writer
///
/// Every field is quoted. The header row is written only when the file does
/// not exist yet or is empty; earlier rows are never rewritten.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    path: PathBuf,
    headers: Vec<String>,
}

impl RecordWriter {
    pub fn new(path: impl Into<PathBuf>, headers: &[&str]) -> Self {
        Self {
            path: path.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the records as data rows
    ///
    /// Rows are encoded in memory first and written with one call. A write
    /// that fails partway is truncated back to the previous file length, so
    /// a retry of the same records never leaves duplicate or torn rows.
    pub fn append(&self, records: &[OutputRecord]) -> OutputResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(OutputError::io(&self.path, e)),
        };

        let mut encoded = Vec::new();
        {
            let mut csv = WriterBuilder::new()
                .quote_style(QuoteStyle::Always)
                .from_writer(&mut encoded);
            if needs_header {
                csv.write_record(&self.headers)?;
            }
            for record in records {
                csv.write_record(&record.fields)?;
            }
            csv.flush().map_err(|e| OutputError::io(&self.path, e))?;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::io(&self.path, e))?;
        append_or_rewind(&mut file, &encoded).map_err(|e| OutputError::io(&self.path, e))?;

        Ok(records.len())
    }
}

/// A sink that can be cut back to an earlier length
trait Rewind: Write {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Rewind for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes all of `bytes` or nothing
fn append_or_rewind<W: Rewind>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let start = out.size()?;
    if let Err(e) = out.write_all(bytes) {
        if let Err(rewind) = out.truncate(start) {
            tracing::error!("Could not remove partially written rows: {}", rewind);
        }
        return Err(e);
    }
    Ok(())
}
