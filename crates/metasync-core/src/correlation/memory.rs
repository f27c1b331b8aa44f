//! Process-local correlation store

use super::{CorrelationStore, RecordIndex};
use crate::Result;
use metasync_model::CorrelationRecord;

/// Correlation store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCorrelationStore {
    index: RecordIndex,
}

impl MemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records
    pub fn with_records(records: Vec<CorrelationRecord>) -> Result<Self> {
        Ok(Self {
            index: RecordIndex::from_records(records)?,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }
}

impl CorrelationStore for MemoryCorrelationStore {
    fn lookup_by_source(&self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        Ok(self.index.by_source(source_key).cloned())
    }

    fn lookup_by_destination(&self, destination_key: &str) -> Result<Option<CorrelationRecord>> {
        Ok(self.index.by_destination(destination_key).cloned())
    }

    fn upsert(&mut self, record: CorrelationRecord) -> Result<()> {
        self.index.upsert(record)
    }

    fn delete(&mut self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        Ok(self.index.remove(source_key))
    }

    fn records(&self) -> Result<Vec<CorrelationRecord>> {
        Ok(self.index.all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use metasync_model::{Provenance, Side};

    #[test]
    fn lookups_are_side_effect_free() {
        let mut store = MemoryCorrelationStore::new();
        let rec = CorrelationRecord::new("s1", "d1", Side::Source, Provenance::default(), Utc::now());
        store.upsert(rec.clone()).unwrap();

        assert_eq!(store.lookup_by_source("s1").unwrap(), Some(rec.clone()));
        assert_eq!(store.lookup_by_source("s1").unwrap(), Some(rec.clone()));
        assert_eq!(store.lookup_by_destination("d1").unwrap(), Some(rec));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_record_is_not_an_error() {
        let store = MemoryCorrelationStore::new();
        assert_eq!(store.lookup_by_source("nope").unwrap(), None);
        assert_eq!(store.lookup_by_destination("nope").unwrap(), None);
    }
}
