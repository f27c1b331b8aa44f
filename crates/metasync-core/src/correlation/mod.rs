//! Correlation store: durable source-to-destination links
//!
//! The store is the only state shared between sweeps. A missing record is
//! not an error, it means "not yet synchronized". Reads must observe the
//! immediately preceding write from the same process.
//!
//! Backends:
//! - [`MemoryCorrelationStore`]: process-local, for tests and dry runs
//! - [`FileCorrelationStore`]: TOML file, written through on every mutation
//! - [`LinkedCorrelationStore`]: records kept inside the destination system

mod file;
mod linked;
mod memory;

pub use file::FileCorrelationStore;
pub use linked::LinkedCorrelationStore;
pub use memory::MemoryCorrelationStore;

use crate::{Error, Result};
use metasync_model::CorrelationRecord;
use std::collections::BTreeMap;

/// Mapping property: who created the record
pub const MAPPING_CREATED_BY: &str = "createdBy";
/// Mapping property: sync scope the record belongs to
pub const MAPPING_SCOPE: &str = "syncScope";
/// Mapping property: owner's display name at the last write
pub const MAPPING_OWNER_NAME: &str = "ownerName";
/// Mapping property: name assigned to the copy at the last write
pub const MAPPING_COPY_NAME: &str = "copyName";
/// Mapping property: source entity's own stamp at the last write
pub const MAPPING_SOURCE_SEEN: &str = "sourceSeenAt";
/// Mapping property: destination entity's own stamp at the last write
pub const MAPPING_DESTINATION_SEEN: &str = "destinationSeenAt";

/// Storage contract for correlation records
pub trait CorrelationStore: Send {
    /// Record for a source key, if any
    fn lookup_by_source(&self, source_key: &str) -> Result<Option<CorrelationRecord>>;

    /// Record pointing at a destination key, if any
    fn lookup_by_destination(&self, destination_key: &str) -> Result<Option<CorrelationRecord>>;

    /// Insert or replace the record for `record.source_key`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCorrelation`] if the destination key is
    /// already linked to a different source key.
    fn upsert(&mut self, record: CorrelationRecord) -> Result<()>;

    /// Remove the record for a source key, returning it if present
    fn delete(&mut self, source_key: &str) -> Result<Option<CorrelationRecord>>;

    /// All records, ordered by source key
    fn records(&self) -> Result<Vec<CorrelationRecord>>;
}

/// In-memory index shared by the local backends
///
/// Keyed by source key with a reverse index on destination key, so each key
/// appears in at most one record.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordIndex {
    records: BTreeMap<String, CorrelationRecord>,
    by_destination: BTreeMap<String, String>,
}

impl RecordIndex {
    pub(crate) fn from_records(records: Vec<CorrelationRecord>) -> Result<Self> {
        let mut index = Self::default();
        for record in records {
            index.upsert(record)?;
        }
        Ok(index)
    }

    pub(crate) fn by_source(&self, source_key: &str) -> Option<&CorrelationRecord> {
        self.records.get(source_key)
    }

    pub(crate) fn by_destination(&self, destination_key: &str) -> Option<&CorrelationRecord> {
        self.by_destination
            .get(destination_key)
            .and_then(|source| self.records.get(source))
    }

    pub(crate) fn upsert(&mut self, record: CorrelationRecord) -> Result<()> {
        if let Some(dest) = &record.destination_key
            && let Some(existing) = self.by_destination.get(dest)
            && *existing != record.source_key
        {
            return Err(Error::DuplicateCorrelation {
                source_key: record.source_key.clone(),
                destination_key: dest.clone(),
                existing_source_key: existing.clone(),
            });
        }

        if let Some(previous) = self.records.get(&record.source_key)
            && let Some(old_dest) = &previous.destination_key
        {
            self.by_destination.remove(old_dest);
        }
        if let Some(dest) = &record.destination_key {
            self.by_destination
                .insert(dest.clone(), record.source_key.clone());
        }
        self.records.insert(record.source_key.clone(), record);
        Ok(())
    }

    pub(crate) fn remove(&mut self, source_key: &str) -> Option<CorrelationRecord> {
        let removed = self.records.remove(source_key)?;
        if let Some(dest) = &removed.destination_key {
            self.by_destination.remove(dest);
        }
        Some(removed)
    }

    pub(crate) fn all(&self) -> Vec<CorrelationRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
