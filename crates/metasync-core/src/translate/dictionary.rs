//! Configuration-driven property mapping
//!
//! The [`AttributeDictionary`] names the attributes that have a first-class
//! counterpart on the other side. It is configuration data, loaded from the
//! `[mapping]` section of the sync configuration.

use metasync_model::{EntityEnvelope, Side};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::description::split_description;
use super::flatten::{flatten_into, unflatten};
use super::{
    ADDITIONAL_PROPERTIES, DestinationProperties, PropertyMapper, SourceAttributes, TypeHint,
};

/// A source attribute and its destination counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPair {
    pub source: String,
    pub destination: String,
}

impl FieldPair {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// A single source description split into a destination summary and
/// full description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionFields {
    pub source: String,
    pub summary: String,
    pub description: String,
}

impl Default for DescriptionFields {
    fn default() -> Self {
        Self {
            source: "description".to_string(),
            summary: "summary".to_string(),
            description: "description".to_string(),
        }
    }
}

fn default_name() -> FieldPair {
    FieldPair::new("name", "displayName")
}

fn default_fields() -> Vec<FieldPair> {
    vec![
        FieldPair::new("qualifiedName", "qualifiedName"),
        FieldPair::new("owner", "owner"),
        FieldPair::new("dataType", "dataType"),
        FieldPair::new("position", "position"),
    ]
}

/// Attribute names with a first-class mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDictionary {
    /// The display-name pair, used for unique naming
    #[serde(default = "default_name")]
    pub name: FieldPair,
    #[serde(default)]
    pub description: DescriptionFields,
    /// Plain attributes copied as-is
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldPair>,
}

impl Default for AttributeDictionary {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: DescriptionFields::default(),
            fields: default_fields(),
        }
    }
}

/// [`PropertyMapper`] driven by an [`AttributeDictionary`]
#[derive(Debug, Clone)]
pub struct DictionaryMapper {
    dictionary: AttributeDictionary,
    known_source: BTreeSet<String>,
    known_destination: BTreeSet<String>,
}

impl DictionaryMapper {
    pub fn new(dictionary: AttributeDictionary) -> Self {
        let mut known_source = BTreeSet::new();
        let mut known_destination = BTreeSet::new();

        known_source.insert(dictionary.name.source.clone());
        known_destination.insert(dictionary.name.destination.clone());
        known_source.insert(dictionary.description.source.clone());
        known_destination.insert(dictionary.description.summary.clone());
        known_destination.insert(dictionary.description.description.clone());
        for pair in &dictionary.fields {
            known_source.insert(pair.source.clone());
            known_destination.insert(pair.destination.clone());
        }
        known_destination.insert(ADDITIONAL_PROPERTIES.to_string());

        Self {
            dictionary,
            known_source,
            known_destination,
        }
    }

    pub fn dictionary(&self) -> &AttributeDictionary {
        &self.dictionary
    }

    fn plain_pairs(&self) -> impl Iterator<Item = &FieldPair> {
        std::iter::once(&self.dictionary.name).chain(self.dictionary.fields.iter())
    }
}

impl Default for DictionaryMapper {
    fn default() -> Self {
        Self::new(AttributeDictionary::default())
    }
}

impl PropertyMapper for DictionaryMapper {
    fn to_destination(
        &self,
        envelope: &EntityEnvelope,
        hint: &TypeHint<'_>,
    ) -> DestinationProperties {
        let mut attributes = BTreeMap::new();
        let mut additional = BTreeMap::new();

        for pair in self.plain_pairs() {
            if let Some(value) = envelope.attributes.get(&pair.source) {
                attributes.insert(pair.destination.clone(), value.clone());
            }
        }

        let desc = &self.dictionary.description;
        match envelope.attributes.get(&desc.source) {
            Some(Value::String(text)) => {
                let (summary, full) = split_description(text);
                attributes.insert(desc.summary.clone(), Value::String(summary));
                attributes.insert(desc.description.clone(), Value::String(full));
            }
            Some(other) => flatten_into(&mut additional, &desc.source, other),
            None => {}
        }

        for (name, value) in &envelope.attributes {
            if !self.known_source.contains(name) {
                flatten_into(&mut additional, name, value);
            }
        }

        DestinationProperties {
            type_name: hint.destination_type.to_string(),
            attributes,
            additional_properties: additional,
        }
    }

    fn to_source(&self, envelope: &EntityEnvelope, hint: &TypeHint<'_>) -> SourceAttributes {
        let mut attributes = BTreeMap::new();

        for pair in self.plain_pairs() {
            if let Some(value) = envelope.attributes.get(&pair.destination) {
                attributes.insert(pair.source.clone(), value.clone());
            }
        }

        let desc = &self.dictionary.description;
        let text = envelope
            .attributes
            .get(&desc.description)
            .or_else(|| envelope.attributes.get(&desc.summary));
        if let Some(text) = text {
            attributes.insert(desc.source.clone(), text.clone());
        }

        // Unmapped destination attributes carry over under their own names
        for (name, value) in &envelope.attributes {
            if !self.known_destination.contains(name) && !self.known_source.contains(name) {
                attributes.insert(name.clone(), value.clone());
            }
        }

        if let Some(Value::Object(bag)) = envelope.attributes.get(ADDITIONAL_PROPERTIES) {
            let flat: BTreeMap<String, String> = bag
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect();
            for (name, value) in unflatten(&flat) {
                attributes.entry(name).or_insert(value);
            }
        }

        SourceAttributes {
            type_name: hint.source_type.to_string(),
            attributes,
        }
    }

    fn name_field(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.dictionary.name.source,
            Side::Destination => &self.dictionary.name.destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const HINT: TypeHint<'static> = TypeHint {
        source_type: "hive_table",
        destination_type: "Table",
    };

    fn table() -> EntityEnvelope {
        EntityEnvelope::new("hive_table")
            .with_key("t1")
            .with_attribute("name", "orders")
            .with_attribute("description", "Order facts. One row per order line.")
            .with_attribute("owner", "sales-eng")
            .with_attribute("tableType", "MANAGED_TABLE")
            .with_attribute("partitionKeys", json!(["dt", "region"]))
    }

    #[test]
    fn known_fields_map_positionally() {
        let props = DictionaryMapper::default().to_destination(&table(), &HINT);

        assert_eq!(props.type_name, "Table");
        assert_eq!(props.attributes["displayName"], json!("orders"));
        assert_eq!(props.attributes["owner"], json!("sales-eng"));
        assert_eq!(props.attributes["summary"], json!("Order facts."));
        assert_eq!(
            props.attributes["description"],
            json!("Order facts. One row per order line.")
        );
    }

    #[test]
    fn unknown_fields_go_to_additional_properties() {
        let props = DictionaryMapper::default().to_destination(&table(), &HINT);

        assert_eq!(props.additional_properties["tableType"], "MANAGED_TABLE");
        assert_eq!(props.additional_properties["partitionKeys.0"], "dt");
        assert_eq!(props.additional_properties["partitionKeys.1"], "region");
        assert!(!props.additional_properties.contains_key("name"));
    }

    #[test]
    fn into_envelope_nests_the_bag() {
        let env = DictionaryMapper::default()
            .to_destination(&table(), &HINT)
            .into_envelope();

        assert_eq!(env.type_name, "Table");
        assert_eq!(env.attributes[ADDITIONAL_PROPERTIES]["tableType"], json!("MANAGED_TABLE"));
    }

    #[test]
    fn to_source_restores_unmapped_attributes() {
        let mapper = DictionaryMapper::default();
        let dest = mapper.to_destination(&table(), &HINT).into_envelope();
        let back = mapper.to_source(&dest, &HINT);

        assert_eq!(back.type_name, "hive_table");
        assert_eq!(back.attributes["tableType"], json!("MANAGED_TABLE"));
        assert_eq!(back.attributes["partitionKeys"], json!(["dt", "region"]));
        assert_eq!(
            back.attributes["description"],
            json!("Order facts. One row per order line.")
        );
        assert!(!back.attributes.contains_key("summary"));
        assert!(!back.attributes.contains_key(ADDITIONAL_PROPERTIES));
    }

    #[test]
    fn to_source_falls_back_to_summary() {
        let dest = EntityEnvelope::new("GlossaryTerm")
            .with_attribute("displayName", "Revenue")
            .with_attribute("summary", "Money in.");

        let back = DictionaryMapper::default().to_source(&dest, &HINT);
        assert_eq!(back.attributes["name"], json!("Revenue"));
        assert_eq!(back.attributes["description"], json!("Money in."));
    }

    #[test]
    fn custom_dictionary_changes_field_names() {
        let dictionary: AttributeDictionary = toml::from_str(
            r#"
name = { source = "tableName", destination = "displayName" }
description = { source = "comment", summary = "summary", description = "description" }
fields = []
"#,
        )
        .unwrap();
        let mapper = DictionaryMapper::new(dictionary);
        let env = EntityEnvelope::new("hive_table")
            .with_attribute("tableName", "orders")
            .with_attribute("comment", "Orders.")
            .with_attribute("owner", "x");

        let props = mapper.to_destination(&env, &HINT);
        assert_eq!(props.attributes["displayName"], json!("orders"));
        assert_eq!(props.additional_properties["owner"], "x");
        assert_eq!(mapper.name_field(Side::Source), "tableName");
    }
}
