//! Property translation between the two systems' attribute shapes
//!
//! A [`PropertyMapper`] converts one side's attribute set into the other's.
//! Known attributes are copied positionally with light transforms; anything
//! else lands in the destination's string-valued additional-properties bag
//! (flattened into dotted keys) so nothing is dropped.
//!
//! Mapping is a capability selected by configuration. [`DictionaryMapper`]
//! is the configuration-driven implementation; a technology with unusual
//! needs implements the trait directly.

mod description;
mod dictionary;
mod flatten;

pub use description::split_description;
pub use dictionary::{AttributeDictionary, DescriptionFields, DictionaryMapper, FieldPair};
pub use flatten::{flatten_into, unflatten};

use metasync_model::{EntityEnvelope, Side};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute name of the additional-properties bag on destination entities
pub const ADDITIONAL_PROPERTIES: &str = "additionalProperties";

/// The pair of type names an entity has on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeHint<'a> {
    pub source_type: &'a str,
    pub destination_type: &'a str,
}

impl<'a> TypeHint<'a> {
    pub fn new(source_type: &'a str, destination_type: &'a str) -> Self {
        Self {
            source_type,
            destination_type,
        }
    }

    pub fn type_on(&self, side: Side) -> &'a str {
        match side {
            Side::Source => self.source_type,
            Side::Destination => self.destination_type,
        }
    }
}

/// Properties of a destination entity built from a source envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DestinationProperties {
    pub type_name: String,
    /// First-class attributes keyed by destination attribute names
    pub attributes: BTreeMap<String, Value>,
    /// Everything without a first-class field, string-valued
    pub additional_properties: BTreeMap<String, String>,
}

impl DestinationProperties {
    /// Render as an envelope ready for a create or update call
    pub fn into_envelope(self) -> EntityEnvelope {
        let mut envelope = EntityEnvelope::new(self.type_name);
        envelope.attributes = self.attributes;
        if !self.additional_properties.is_empty() {
            let bag = self
                .additional_properties
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            envelope
                .attributes
                .insert(ADDITIONAL_PROPERTIES.to_string(), Value::Object(bag));
        }
        envelope
    }
}

/// Attributes of a source entity built from a destination envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceAttributes {
    pub type_name: String,
    pub attributes: BTreeMap<String, Value>,
}

impl SourceAttributes {
    pub fn into_envelope(self) -> EntityEnvelope {
        let mut envelope = EntityEnvelope::new(self.type_name);
        envelope.attributes = self.attributes;
        envelope
    }
}

/// Capability interface for translating between attribute shapes
///
/// Implementations must be pure: no I/O, deterministic output.
pub trait PropertyMapper: Send + Sync {
    /// Build destination properties from a source envelope
    fn to_destination(&self, envelope: &EntityEnvelope, hint: &TypeHint<'_>)
    -> DestinationProperties;

    /// Build source attributes from a destination envelope
    fn to_source(&self, envelope: &EntityEnvelope, hint: &TypeHint<'_>) -> SourceAttributes;

    /// Attribute holding the display name on `side`
    fn name_field(&self, side: Side) -> &str;

    /// Translate an envelope from `from` into an envelope for the other side
    fn translate(&self, envelope: &EntityEnvelope, from: Side, hint: &TypeHint<'_>) -> EntityEnvelope {
        match from {
            Side::Source => self.to_destination(envelope, hint).into_envelope(),
            Side::Destination => self.to_source(envelope, hint).into_envelope(),
        }
    }

    /// Display name of an envelope from `side`
    fn name_of<'e>(&self, envelope: &'e EntityEnvelope, side: Side) -> Option<&'e str> {
        envelope.str_attribute(self.name_field(side))
    }
}
