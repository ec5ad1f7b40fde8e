use crate::output::{OutputError, OutputResult, SeenLog};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Column holding the record identifier in the dataset
pub const ID_COLUMN: &str = "id";

/// Outcome of [`compact_output`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactReport {
    pub total_rows: usize,
    pub unique_rows: usize,
    pub backup: PathBuf,
}

impl CompactReport {
    pub fn removed(&self) -> usize {
        self.total_rows - self.unique_rows
    }
}

/// Reads the identifier column of a dataset, in file order
pub fn read_identifiers(path: &Path) -> OutputResult<Vec<String>> {
    let mut reader = open_reader(path)?;
    let idx = id_column(path, reader.headers()?)?;

    let mut ids = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(id) = row.get(idx).map(str::trim).filter(|id| !id.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Drops repeated identifiers, keeping first occurrences in order
pub fn distinct_identifiers(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Rewrites a dataset keeping the first row per identifier
///
/// The original is kept as `<file>.bak` and the seen log is rebuilt from the
/// surviving rows.
pub fn compact_output(path: &Path, seen_log: &SeenLog) -> OutputResult<CompactReport> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let idx = id_column(path, &headers)?;

    let tmp = sibling(path, "tmp");
    let backup = sibling(path, "bak");

    let mut seen = HashSet::new();
    let mut kept_ids = Vec::new();
    let mut total_rows = 0;
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .flexible(true)
            .from_path(&tmp)?;
        writer.write_record(&headers)?;
        for row in reader.records() {
            let row = row?;
            total_rows += 1;
            let id = row.get(idx).unwrap_or("").trim().to_string();
            if id.is_empty() || !seen.insert(id.clone()) {
                continue;
            }
            writer.write_record(&row)?;
            kept_ids.push(id);
        }
        writer.flush().map_err(|e| OutputError::io(&tmp, e))?;
    }

    fs::rename(path, &backup).map_err(|e| OutputError::io(path, e))?;
    fs::rename(&tmp, path).map_err(|e| OutputError::io(&tmp, e))?;
    seen_log.rewrite(&kept_ids)?;

    tracing::info!(
        "Compacted {}: {} rows -> {} unique (backup at {})",
        path.display(),
        total_rows,
        kept_ids.len(),
        backup.display()
    );

    Ok(CompactReport {
        total_rows,
        unique_rows: kept_ids.len(),
        backup,
    })
}

fn id_column(path: &Path, headers: &csv::StringRecord) -> OutputResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or_else(|| OutputError::MissingColumn {
            path: path.to_path_buf(),
            column: ID_COLUMN.to_string(),
        })
}

fn open_reader(path: &Path) -> OutputResult<csv::Reader<fs::File>> {
    let file = fs::File::open(path).map_err(|e| OutputError::io(path, e))?;
    Ok(ReaderBuilder::new().flexible(true).from_reader(file))
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
