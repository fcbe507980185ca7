use crate::entry::AuditEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AuditSinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditSinkError>;

    /// The newest `limit` entries previously written, oldest first.
    fn replay(&self, _limit: usize) -> Result<Vec<AuditEntry>, AuditSinkError> {
        Ok(Vec::new())
    }

    /// Replace everything persisted with `entries`.
    fn rewrite(&self, _entries: &[AuditEntry]) -> Result<(), AuditSinkError> {
        Ok(())
    }
}

/// Discards everything. Used when no audit file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn append(&self, _entry: &AuditEntry) -> Result<(), AuditSinkError> {
        Ok(())
    }
}

/// Append-only JSON Lines file, synced after every entry.
pub struct JsonlFileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlFileSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuditSinkError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlFileSink {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
        let json = serde_json::to_string(entry)?;
        let mut file = self.file.lock();
        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }

    fn replay(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditSinkError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = VecDeque::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => {
                    if entries.len() == limit {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
                Err(e) => warn!("Skipping malformed audit line {} in {}: {}", number + 1, self.path.display(), e),
            }
        }

        Ok(entries.into())
    }

    /// Write `entries` to a temporary file and move it over the log.
    fn rewrite(&self, entries: &[AuditEntry]) -> Result<(), AuditSinkError> {
        let mut file = self.file.lock();
        let tmp_path = self.path.with_extension("tmp");

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        *file = OpenOptions::new().append(true).open(&self.path)?;
        debug!("Compacted {} to {} entries", self.path.display(), entries.len());
        Ok(())
    }
}
