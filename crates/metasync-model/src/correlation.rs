//! Correlation record linking a source entity to its destination counterpart
//!
//! A record is created the first time an entity is copied in either
//! direction, refreshed on every successful reconciliation, and removed when
//! the authoritative original is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::envelope::EntityEnvelope;
use crate::side::Side;

/// Provenance of the source entity captured at the last write
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Provenance {
    /// Snapshot the provenance fields of a source-side envelope
    pub fn of(envelope: &EntityEnvelope) -> Self {
        Self {
            type_name: envelope.type_name.clone(),
            version: envelope.version,
            created_by: envelope.created_by.clone(),
            created_at: envelope.created_at,
            updated_by: envelope.updated_by.clone(),
            updated_at: envelope.updated_at,
        }
    }
}

/// Durable link between an entity in the source system and its counterpart
/// in the destination system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    /// Identifier of the entity in the source system
    pub source_key: String,
    /// Identifier of the counterpart in the destination system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_key: Option<String>,
    /// True when the source system is authoritative for content
    owned_by_source: bool,
    /// Source provenance captured at the last write
    pub source: Provenance,
    /// Last successful reconciliation of this pair
    pub last_synchronized_at: DateTime<Utc>,
    /// Auxiliary bookkeeping (creating module, scope, previously seen names)
    #[serde(default)]
    pub mapping_properties: BTreeMap<String, String>,
}

impl CorrelationRecord {
    /// Create a record for a freshly copied entity
    ///
    /// Ownership is fixed here: the side that initiated the copy owns the
    /// content.
    pub fn new(
        source_key: impl Into<String>,
        destination_key: impl Into<String>,
        owner: Side,
        source: Provenance,
        synchronized_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            destination_key: Some(destination_key.into()),
            owned_by_source: owner == Side::Source,
            source,
            last_synchronized_at: synchronized_at,
            mapping_properties: BTreeMap::new(),
        }
    }

    /// Whether the source system is authoritative
    pub fn owned_by_source(&self) -> bool {
        self.owned_by_source
    }

    /// The authoritative side
    pub fn owner(&self) -> Side {
        if self.owned_by_source {
            Side::Source
        } else {
            Side::Destination
        }
    }

    /// The side holding the mirrored copy
    pub fn copy_side(&self) -> Side {
        self.owner().opposite()
    }

    /// Key of this entity on `side`
    pub fn key_on(&self, side: Side) -> Option<&str> {
        match side {
            Side::Source => Some(self.source_key.as_str()),
            Side::Destination => self.destination_key.as_deref(),
        }
    }

    /// Replace the key on `side` (used when a missing copy is recreated)
    pub fn set_key_on(&mut self, side: Side, key: impl Into<String>) {
        match side {
            Side::Source => self.source_key = key.into(),
            Side::Destination => self.destination_key = Some(key.into()),
        }
    }

    /// Explicitly hand authority over to `owner`
    ///
    /// Normal synchronization never calls this; it exists for administrative
    /// reassignment.
    pub fn reassign_owner(&mut self, owner: Side) {
        self.owned_by_source = owner == Side::Source;
    }

    /// Record a successful reconciliation
    pub fn confirm(&mut self, at: DateTime<Utc>) {
        self.last_synchronized_at = at;
    }

    pub fn mapping_property(&self, name: &str) -> Option<&str> {
        self.mapping_properties.get(name).map(String::as_str)
    }

    pub fn set_mapping_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.mapping_properties.insert(name.into(), value.into());
    }
}
