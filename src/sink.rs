use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::record::Record;

/// Appends record batches to `<dir>/<name>.csv`.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Append `records` with the first record's keys as columns. Empty
    /// batches touch nothing. The header is written whenever asked.
    pub fn write(&self, name: &str, records: &[Record], write_header: bool) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let path = self.path(name);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output dir {}", self.dir.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        write_rows(file, records, write_header)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!(path = %path.display(), rows = records.len(), header = write_header, "appended rows");
        Ok(records.len())
    }

    /// Remove `<name>.csv` if present.
    pub fn truncate(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Write `records` as CSV, columns taken from the first record's keys.
/// Missing keys become empty cells; extra keys are dropped.
pub fn write_rows<W: Write>(out: W, records: &[Record], write_header: bool) -> csv::Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let columns: Vec<&str> = first.keys().collect();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    if write_header {
        writer.write_record(&columns)?;
    }
    for record in records {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or_default()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Header-once bookkeeping for one run: a destination gets its header on
/// its first non-empty write.
pub struct RunWriter<'a> {
    sink: &'a CsvSink,
    written: HashSet<String>,
}

impl<'a> RunWriter<'a> {
    pub fn new(sink: &'a CsvSink) -> Self {
        Self {
            sink,
            written: HashSet::new(),
        }
    }

    pub fn write(&mut self, name: &str, records: &[Record]) -> Result<usize> {
        let header = !self.written.contains(name);
        let n = self.sink.write(name, records, header)?;
        if n > 0 {
            self.written.insert(name.to_string());
        }
        Ok(n)
    }
}

// ── Tests ──
