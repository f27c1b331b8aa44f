//! Property tests for attribute translation
//!
//! Unmapped values travel through the destination's string-valued bag, so
//! numbers and booleans come back as their string rendering. Nulls are not
//! carried at all. Everything else must come back unchanged.

use std::collections::BTreeMap;

use metasync_core::translate::{ADDITIONAL_PROPERTIES, TypeHint};
use metasync_core::{DictionaryMapper, PropertyMapper};
use metasync_model::{EntityEnvelope, Side};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

const HINT: TypeHint<'static> = TypeHint {
    source_type: "hive_table",
    destination_type: "Table",
};

/// Strings that include the characters the bag encoding relies on
fn text() -> impl Strategy<Value = String> {
    prop_oneof![
        r"[a-zA-Z0-9 ,.:/_\[\]{}\\-]{0,16}",
        Just("[]".to_string()),
        Just("{}".to_string()),
        Just(r"\[]".to_string()),
    ]
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => text().prop_map(Value::String),
        1 => any::<i64>().prop_map(|n| json!(n)),
        1 => any::<bool>().prop_map(Value::Bool),
        1 => Just(json!([])),
        1 => Just(json!({})),
    ]
}

/// Object keys, including dotted, escaped and index-like ones
fn member_key() -> impl Strategy<Value = String> {
    prop_oneof![r"[a-z.\\]{0,5}", "[0-9]{1,2}"]
}

fn unmapped_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Value::Array),
            prop::collection::btree_map(member_key(), inner, 1..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Attribute names outside the default dictionary, dots included
fn unmapped_attributes() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map(r"x[a-z0-9._\\]{0,8}", unmapped_value(), 0..6)
}

/// What a value looks like after a trip through the bag
fn stringified(value: &Value) -> Value {
    match value {
        Value::Number(_) | Value::Bool(_) => Value::String(value.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(stringified).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), stringified(v))).collect())
        }
        other => other.clone(),
    }
}

proptest! {
    #[test]
    fn unmapped_attributes_survive_a_round_trip(
        attributes in unmapped_attributes(),
        name in "[a-zA-Z][a-zA-Z0-9 ]{0,12}",
    ) {
        let mapper = DictionaryMapper::default();
        let mut source = EntityEnvelope::new("hive_table").with_attribute("name", name.clone());
        for (key, value) in &attributes {
            source.attributes.insert(key.clone(), value.clone());
        }

        let destination = mapper.translate(&source, Side::Source, &HINT);
        for key in attributes.keys() {
            prop_assert!(!destination.attributes.contains_key(key));
        }
        if !attributes.is_empty() {
            prop_assert!(destination.attributes.contains_key(ADDITIONAL_PROPERTIES));
        }

        let back = mapper.translate(&destination, Side::Destination, &HINT);
        prop_assert_eq!(back.str_attribute("name"), Some(name.as_str()));
        for (key, value) in &attributes {
            prop_assert_eq!(back.attributes.get(key), Some(&stringified(value)));
        }
        prop_assert_eq!(back.attributes.len(), attributes.len() + 1);
    }

    #[test]
    fn destination_bag_is_string_valued(attributes in unmapped_attributes()) {
        let mut source = EntityEnvelope::new("hive_table");
        source.attributes = attributes;

        let props = DictionaryMapper::default().to_destination(&source, &HINT);
        let envelope = props.into_envelope();
        if let Some(Value::Object(bag)) = envelope.attributes.get(ADDITIONAL_PROPERTIES) {
            prop_assert!(bag.values().all(Value::is_string));
        }
    }
}

#[test]
fn dotted_names_and_marker_strings_round_trip() {
    let mapper = DictionaryMapper::default();
    let source = EntityEnvelope::new("hive_table")
        .with_attribute("name", "orders")
        .with_attribute("spark.sql.provider", "parquet")
        .with_attribute("marker", "[]")
        .with_attribute("retention", 30);

    let destination = mapper.translate(&source, Side::Source, &HINT);
    let back = mapper.translate(&destination, Side::Destination, &HINT);

    assert_eq!(back.attributes.get("spark.sql.provider"), Some(&json!("parquet")));
    assert_eq!(back.attributes.get("marker"), Some(&json!("[]")));
    assert_eq!(back.attributes.get("retention"), Some(&json!("30")));
    assert!(!back.attributes.contains_key("spark"));
}
