//! Correlation records stored inside the destination system
//!
//! Each record is a correlation object linked to the destination entity it
//! describes, maintained through the destination's link primitives.

use std::sync::Arc;

use super::CorrelationStore;
use crate::error::ClientResultExt;
use crate::{Error, Result};
use metasync_model::{CorrelationLinks, CorrelationRecord, Side};

/// Correlation store backed by [`CorrelationLinks`]
pub struct LinkedCorrelationStore {
    links: Arc<dyn CorrelationLinks>,
}

impl LinkedCorrelationStore {
    pub fn new(links: Arc<dyn CorrelationLinks>) -> Self {
        Self { links }
    }
}

impl CorrelationStore for LinkedCorrelationStore {
    fn lookup_by_source(&self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        self.links
            .get_linked_external_id(source_key)
            .on(Side::Destination)
    }

    fn lookup_by_destination(&self, destination_key: &str) -> Result<Option<CorrelationRecord>> {
        self.links
            .get_link_by_destination(destination_key)
            .on(Side::Destination)
    }

    fn upsert(&mut self, record: CorrelationRecord) -> Result<()> {
        if let Some(dest) = &record.destination_key
            && let Some(existing) = self.lookup_by_destination(dest)?
            && existing.source_key != record.source_key
        {
            return Err(Error::DuplicateCorrelation {
                source_key: record.source_key.clone(),
                destination_key: dest.clone(),
                existing_source_key: existing.source_key,
            });
        }

        // A record whose only change is the sync stamp is confirmed in place
        if let Some(current) = self.lookup_by_source(&record.source_key)? {
            let mut stamped = current.clone();
            stamped.confirm(record.last_synchronized_at);
            if stamped == record {
                return self
                    .links
                    .confirm_synchronized(&record.source_key, record.last_synchronized_at)
                    .on(Side::Destination);
            }
        }

        self.links.link_external_id(&record).on(Side::Destination)
    }

    fn delete(&mut self, source_key: &str) -> Result<Option<CorrelationRecord>> {
        let existing = self.lookup_by_source(source_key)?;
        if existing.is_some() {
            self.links
                .unlink_external_id(source_key)
                .on(Side::Destination)?;
        }
        Ok(existing)
    }

    fn records(&self) -> Result<Vec<CorrelationRecord>> {
        let mut records = self.links.list_links().on(Side::Destination)?;
        records.sort_by(|a, b| a.source_key.cmp(&b.source_key));
        Ok(records)
    }
}
