//! Operations the engine consumes from each metadata system
//!
//! Transport, pagination mechanics, authentication and retry/backoff are the
//! implementor's concern. From the engine's point of view every call is a
//! synchronous, blocking request.

use chrono::{DateTime, Utc};

use crate::correlation::CorrelationRecord;
use crate::envelope::{EntityEnvelope, EntityHeader, ParentLink};
use crate::error::ClientResult;

/// Create/read/update/delete access to one metadata system
pub trait MetadataClient: Send + Sync {
    /// Name used in logs and audit events
    fn system_name(&self) -> &str;

    /// One page of entities of `type_name`; an empty page ends enumeration
    fn list_entities_by_type(
        &self,
        type_name: &str,
        offset: usize,
        page_size: usize,
    ) -> ClientResult<Vec<EntityHeader>>;

    /// Fetch one entity
    fn get_entity(&self, key: &str) -> ClientResult<EntityEnvelope>;

    /// Entities reachable from `key` through `relationship`
    fn get_related_entities(&self, key: &str, relationship: &str)
    -> ClientResult<Vec<EntityEnvelope>>;

    /// Create an entity, optionally attached to a parent; returns the new key
    fn create_entity(
        &self,
        envelope: &EntityEnvelope,
        parent: Option<&ParentLink>,
    ) -> ClientResult<String>;

    /// Replace the content of an existing entity
    fn update_entity(&self, key: &str, envelope: &EntityEnvelope) -> ClientResult<()>;

    /// Delete an entity (and whatever the system cascades)
    fn delete_entity(&self, key: &str) -> ClientResult<()>;
}

/// Correlation-link primitives offered by the destination system
///
/// Used when the destination itself stores correlation records, linked to
/// the entities they describe.
pub trait CorrelationLinks: Send + Sync {
    /// Create or replace the link for `record.source_key`
    fn link_external_id(&self, record: &CorrelationRecord) -> ClientResult<()>;

    /// Link for a source key, if any
    fn get_linked_external_id(&self, source_key: &str) -> ClientResult<Option<CorrelationRecord>>;

    /// Link pointing at a destination entity, if any
    fn get_link_by_destination(
        &self,
        destination_key: &str,
    ) -> ClientResult<Option<CorrelationRecord>>;

    /// Stamp the link as synchronized at `at`
    fn confirm_synchronized(&self, source_key: &str, at: DateTime<Utc>) -> ClientResult<()>;

    /// Remove the link for a source key
    fn unlink_external_id(&self, source_key: &str) -> ClientResult<()>;

    /// All links
    fn list_links(&self) -> ClientResult<Vec<CorrelationRecord>>;
}

/// A destination system: metadata access plus correlation links
pub trait DestinationClient: MetadataClient + CorrelationLinks {}

impl<T: MetadataClient + CorrelationLinks> DestinationClient for T {}
