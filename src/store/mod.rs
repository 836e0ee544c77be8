pub mod record;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use thiserror::Error;
use tracing::{info, warn};

use record::{HEADERS, LogRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Append-only record store backed by a CSV file. The file is the only
/// coordination point between the writer and any readers: the writer appends
/// whole rows, readers re-read the full file.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the store with its header row. An existing file is left
    /// untouched, never truncated.
    pub fn initialize(&self) -> Result<()> {
        if self.path.exists() {
            info!("Log store already exists at {}", self.path.display());
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HEADERS)?;
        writer.flush()?;
        info!("Created log store at {}", self.path.display());
        Ok(())
    }

    /// Append a single row. The record is fully formed before this call, so a
    /// failure here loses the row but never leaves a prior row corrupted.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// All data rows as raw fields, header skipped. A missing file reads as
    /// empty; rows that cannot be decoded (including a partial trailing line
    /// mid-write) are skipped rather than failing the load.
    pub fn load_all(&self) -> Result<Vec<StringRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let mut rows = Vec::new();
        for result in reader.records() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping unreadable log row: {}", e),
            }
        }
        Ok(rows)
    }
}
