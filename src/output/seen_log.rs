use crate::output::{OutputError, OutputResult};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One identifier per line, append-only
///
/// Read fully at startup to seed the local dedup mirror.
#[derive(Debug, Clone)]
pub struct SeenLog {
    path: PathBuf,
}

impl SeenLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every identifier; a missing file is an empty set
    pub fn load(&self) -> OutputResult<HashSet<String>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(OutputError::io(&self.path, e)),
        };

        let mut ids = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| OutputError::io(&self.path, e))?;
            let id = line.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Appends identifiers, one per line
    pub fn append(&self, ids: &[String]) -> OutputResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut file = self.open(false)?;
        file.write_all(join_lines(ids).as_bytes())
            .map_err(|e| OutputError::io(&self.path, e))
    }

    /// Replaces the whole log
    pub fn rewrite(&self, ids: &[String]) -> OutputResult<()> {
        let mut file = self.open(true)?;
        file.write_all(join_lines(ids).as_bytes())
            .map_err(|e| OutputError::io(&self.path, e))
    }

    fn open(&self, truncate: bool) -> OutputResult<fs::File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        options
            .open(&self.path)
            .map_err(|e| OutputError::io(&self.path, e))
    }
}

fn join_lines(ids: &[String]) -> String {
    let mut out = String::with_capacity(ids.iter().map(|id| id.len() + 1).sum());
    for id in ids {
        out.push_str(id);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let log = SeenLog::new(dir.path().join("seen.txt"));
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_load() {
        let dir = TempDir::new().unwrap();
        let log = SeenLog::new(dir.path().join("seen.txt"));
        log.append(&ids(&["1", "2"])).unwrap();
        log.append(&ids(&["2", "3"])).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.contains("3"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.txt");
        fs::write(&path, "1\n\n  \n2\r\n").unwrap();
        let loaded = SeenLog::new(&path).load().unwrap();
        let expected: HashSet<String> = ["1", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_rewrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let log = SeenLog::new(dir.path().join("seen.txt"));
        log.append(&ids(&["1", "2", "3"])).unwrap();
        log.rewrite(&ids(&["9"])).unwrap();
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "9\n");
    }
}
