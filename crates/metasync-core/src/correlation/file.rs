//! TOML-file correlation store
//!
//! The file is read once at open time under a shared lock, and rewritten
//! atomically after every mutation, so the in-memory view and the file never
//! disagree about the last write.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{CorrelationStore, RecordIndex};
use crate::Result;
use metasync_model::CorrelationRecord;

const FORMAT_VERSION: &str = "1.0";

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// Format version for forward compatibility
    version: String,
    #[serde(default)]
    records: Vec<CorrelationRecord>,
}

/// Correlation store persisted as a TOML file
#[derive(Debug)]
pub struct FileCorrelationStore {
    path: PathBuf,
    index: RecordIndex,
}

impl FileCorrelationStore {
    /// Open the store at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, locked, or
    /// parsed, or if it holds conflicting records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = if path.exists() {
            RecordIndex::from_records(Self::read(&path)?.records)?
        } else {
            RecordIndex::default()
        };
        Ok(Self { path, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<StoreFile> {
        let file = File::open(path)?;
        file.lock_shared()?;

        // Read through the locked handle
        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let parsed: StoreFile = toml::from_str(&content)?;
        Ok(parsed)
    }

    /// Write the whole store with write-to-temp-then-rename under an
    /// exclusive lock
    fn persist(&self) -> Result<()> {
        let content = toml::to_string_pretty(&StoreFile {
            version: FORMAT_VERSION.to_string(),
            records: self.index.all(),
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        lock_file.lock_exclusive()?;

        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        // Lock released when lock_file is dropped
        Ok(())
    }
}

impl CorrelationStore for FileCorrelationStore {
    fn lookup_by_source(&self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        Ok(self.index.by_source(source_key).cloned())
    }

    fn lookup_by_destination(&self, destination_key: &str) -> Result<Option<CorrelationRecord>> {
        Ok(self.index.by_destination(destination_key).cloned())
    }

    fn upsert(&mut self, record: CorrelationRecord) -> Result<()> {
        let source_key = record.source_key.clone();
        let previous = self.index.by_source(&source_key).cloned();
        self.index.upsert(record)?;
        if let Err(e) = self.persist() {
            // Keep memory consistent with what is on disk
            match previous {
                Some(prev) => {
                    let _ = self.index.upsert(prev);
                }
                None => {
                    self.index.remove(&source_key);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        let removed = self.index.remove(source_key);
        if let Some(record) = &removed
            && let Err(e) = self.persist()
        {
            let _ = self.index.upsert(record.clone());
            return Err(e);
        }
        Ok(removed)
    }

    fn records(&self) -> Result<Vec<CorrelationRecord>> {
        Ok(self.index.all())
    }
}
