//! Client wrapper whose clock runs ahead of the engine's

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metasync_model::{
    ClientResult, CorrelationLinks, CorrelationRecord, EntityEnvelope, EntityHeader,
    MetadataClient, ParentLink,
};

/// Shifts every timestamp the inner client reports by `ahead`
///
/// Writes pass through untouched, so entities look as if the remote system
/// stamped them with its own, faster clock.
pub struct SkewedClient<C> {
    inner: Arc<C>,
    ahead: Duration,
}

impl<C> SkewedClient<C> {
    pub fn new(inner: Arc<C>, ahead: Duration) -> Self {
        Self { inner, ahead }
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    fn shift(&self, at: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        at.map(|t| t + self.ahead)
    }

    fn skew(&self, mut envelope: EntityEnvelope) -> EntityEnvelope {
        envelope.created_at = self.shift(envelope.created_at);
        envelope.updated_at = self.shift(envelope.updated_at);
        envelope
    }
}

impl<C: MetadataClient> MetadataClient for SkewedClient<C> {
    fn system_name(&self) -> &str {
        self.inner.system_name()
    }

    fn list_entities_by_type(
        &self,
        type_name: &str,
        offset: usize,
        page_size: usize,
    ) -> ClientResult<Vec<EntityHeader>> {
        let mut page = self.inner.list_entities_by_type(type_name, offset, page_size)?;
        for header in &mut page {
            header.updated_at = self.shift(header.updated_at);
        }
        Ok(page)
    }

    fn get_entity(&self, key: &str) -> ClientResult<EntityEnvelope> {
        self.inner.get_entity(key).map(|e| self.skew(e))
    }

    fn get_related_entities(
        &self,
        key: &str,
        relationship: &str,
    ) -> ClientResult<Vec<EntityEnvelope>> {
        let related = self.inner.get_related_entities(key, relationship)?;
        Ok(related.into_iter().map(|e| self.skew(e)).collect())
    }

    fn create_entity(
        &self,
        envelope: &EntityEnvelope,
        parent: Option<&ParentLink>,
    ) -> ClientResult<String> {
        self.inner.create_entity(envelope, parent)
    }

    fn update_entity(&self, key: &str, envelope: &EntityEnvelope) -> ClientResult<()> {
        self.inner.update_entity(key, envelope)
    }

    fn delete_entity(&self, key: &str) -> ClientResult<()> {
        self.inner.delete_entity(key)
    }
}

impl<C: CorrelationLinks> CorrelationLinks for SkewedClient<C> {
    fn link_external_id(&self, record: &CorrelationRecord) -> ClientResult<()> {
        self.inner.link_external_id(record)
    }

    fn get_linked_external_id(&self, source_key: &str) -> ClientResult<Option<CorrelationRecord>> {
        self.inner.get_linked_external_id(source_key)
    }

    fn get_link_by_destination(
        &self,
        destination_key: &str,
    ) -> ClientResult<Option<CorrelationRecord>> {
        self.inner.get_link_by_destination(destination_key)
    }

    fn confirm_synchronized(&self, source_key: &str, at: DateTime<Utc>) -> ClientResult<()> {
        self.inner.confirm_synchronized(source_key, at)
    }

    fn unlink_external_id(&self, source_key: &str) -> ClientResult<()> {
        self.inner.unlink_external_id(source_key)
    }

    fn list_links(&self) -> ClientResult<Vec<CorrelationRecord>> {
        self.inner.list_links()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasync_core::MemoryCatalog;

    #[test]
    fn reads_are_shifted_and_writes_are_not() {
        let catalog = Arc::new(MemoryCatalog::destination());
        let skewed = SkewedClient::new(catalog.clone(), Duration::seconds(5));
        let key = skewed
            .create_entity(&EntityEnvelope::new("Glossary"), None)
            .unwrap();

        let real = catalog.entity(&key).unwrap();
        let seen = skewed.get_entity(&key).unwrap();
        assert_eq!(
            seen.created_at,
            real.created_at.map(|t| t + Duration::seconds(5))
        );
    }
}
