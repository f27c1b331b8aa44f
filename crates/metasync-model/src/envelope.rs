//! Generic entity views exchanged with either metadata system
//!
//! An [`EntityEnvelope`] is the unit the property translator consumes and
//! produces. It is built per reconciliation pass and never persisted by the
//! engine itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A (type name, attribute map, relationship map) view of one entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityEnvelope {
    /// Identifier in the owning system; absent until the entity is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// System-specific type name (e.g. "hive_table", "GlossaryTerm")
    pub type_name: String,
    /// Attribute values keyed by the system's attribute names
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Related entity keys keyed by relationship name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    /// Last content change; `None` on an entity never updated since creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityEnvelope {
    /// Create an empty envelope of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Set the key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the update timestamp
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Get an attribute as a string slice, if it is a string
    pub fn str_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Key or an empty string, for log fields and error messages
    pub fn key_or_default(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }
}

/// A lightweight listing entry returned by paged enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHeader {
    pub key: String,
    pub type_name: String,
    /// Display name, if the system exposes one in listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The parent an entity is attached to when it is created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentLink {
    /// Key of the parent in the system being written
    pub key: String,
    /// Relationship name from the parent to the new child
    pub relationship: String,
}

impl ParentLink {
    pub fn new(key: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            relationship: relationship.into(),
        }
    }
}
