//! Client wrapper that injects failures

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metasync_model::{
    ClientError, ClientResult, CorrelationLinks, CorrelationRecord, EntityEnvelope, EntityHeader,
    MetadataClient, ParentLink,
};

/// Client operation a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    /// Matched on the type name
    List,
    /// Matched on the entity key
    Get,
    /// Matched on the parent key
    Related,
    /// Matched on the type name of the new entity
    Create,
    /// Matched on the entity key
    Update,
    /// Matched on the entity key
    Delete,
}

/// Wraps a client and fails selected calls until healed
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use metasync_core::MemoryCatalog;
/// use metasync_model::ClientError;
/// use metasync_test_utils::{FaultyClient, Operation};
///
/// let catalog = Arc::new(MemoryCatalog::destination());
/// let faulty = FaultyClient::new(catalog);
/// faulty.fail(Operation::Create, "GlossaryTerm", ClientError::transient("503"));
/// ```
pub struct FaultyClient<C> {
    inner: Arc<C>,
    faults: Mutex<BTreeMap<(Operation, String), ClientError>>,
}

impl<C> FaultyClient<C> {
    pub fn new(inner: Arc<C>) -> Self {
        Self {
            inner,
            faults: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    /// Fail every `operation` on `key` with `error`
    pub fn fail(&self, operation: Operation, key: impl Into<String>, error: ClientError) {
        self.faults
            .lock()
            .unwrap()
            .insert((operation, key.into()), error);
    }

    /// Remove one fault
    pub fn heal(&self, operation: Operation, key: &str) {
        self.faults
            .lock()
            .unwrap()
            .remove(&(operation, key.to_string()));
    }

    /// Remove every fault
    pub fn heal_all(&self) {
        self.faults.lock().unwrap().clear();
    }

    fn check(&self, operation: Operation, key: &str) -> ClientResult<()> {
        match self.faults.lock().unwrap().get(&(operation, key.to_string())) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl<C: MetadataClient> MetadataClient for FaultyClient<C> {
    fn system_name(&self) -> &str {
        self.inner.system_name()
    }

    fn list_entities_by_type(
        &self,
        type_name: &str,
        offset: usize,
        page_size: usize,
    ) -> ClientResult<Vec<EntityHeader>> {
        self.check(Operation::List, type_name)?;
        self.inner.list_entities_by_type(type_name, offset, page_size)
    }

    fn get_entity(&self, key: &str) -> ClientResult<EntityEnvelope> {
        self.check(Operation::Get, key)?;
        self.inner.get_entity(key)
    }

    fn get_related_entities(
        &self,
        key: &str,
        relationship: &str,
    ) -> ClientResult<Vec<EntityEnvelope>> {
        self.check(Operation::Related, key)?;
        self.inner.get_related_entities(key, relationship)
    }

    fn create_entity(
        &self,
        envelope: &EntityEnvelope,
        parent: Option<&ParentLink>,
    ) -> ClientResult<String> {
        self.check(Operation::Create, &envelope.type_name)?;
        self.inner.create_entity(envelope, parent)
    }

    fn update_entity(&self, key: &str, envelope: &EntityEnvelope) -> ClientResult<()> {
        self.check(Operation::Update, key)?;
        self.inner.update_entity(key, envelope)
    }

    fn delete_entity(&self, key: &str) -> ClientResult<()> {
        self.check(Operation::Delete, key)?;
        self.inner.delete_entity(key)
    }
}

impl<C: CorrelationLinks> CorrelationLinks for FaultyClient<C> {
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
