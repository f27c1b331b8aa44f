//! Flattening structured values into the string-valued properties bag
//!
//! Arrays become `name.index` keys and objects `name.subkey` keys, applied
//! recursively. Empty containers are kept as the literals `[]` and `{}` and
//! nulls are omitted.
//!
//! Inside a key segment `\` escapes the next character: a literal `.` is
//! written `\.`, a literal `\` is written `\\`, and an object key that looks
//! like an array index is written with a leading `\` so it stays an object
//! key. A string leaf that equals a container literal or starts with `\` is
//! stored with one extra leading `\`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

const EMPTY_ARRAY: &str = "[]";
const EMPTY_OBJECT: &str = "{}";
const ESCAPE: char = '\\';

/// Flatten `value` into `out` under the attribute name `key`
pub fn flatten_into(out: &mut BTreeMap<String, String>, key: &str, value: &Value) {
    flatten_at(out, escape_key(key), value);
}

fn flatten_at(out: &mut BTreeMap<String, String>, path: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.insert(path, escape_leaf(s));
        }
        Value::Bool(_) | Value::Number(_) => {
            out.insert(path, value.to_string());
        }
        Value::Array(items) if items.is_empty() => {
            out.insert(path, EMPTY_ARRAY.to_string());
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten_at(out, format!("{}.{}", path, idx), item);
            }
        }
        Value::Object(map) if map.is_empty() => {
            out.insert(path, EMPTY_OBJECT.to_string());
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten_at(out, format!("{}.{}", path, escape_key(sub)), item);
            }
        }
    }
}

fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    if canonical_index(key).is_some() {
        escaped.push(ESCAPE);
    }
    for c in key.chars() {
        if c == '.' || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn escape_leaf(s: &str) -> String {
    if s == EMPTY_ARRAY || s == EMPTY_OBJECT || s.starts_with(ESCAPE) {
        format!("{}{}", ESCAPE, s)
    } else {
        s.to_string()
    }
}

fn unescape_leaf(raw: &str) -> Value {
    match raw {
        EMPTY_ARRAY => Value::Array(Vec::new()),
        EMPTY_OBJECT => Value::Object(Map::new()),
        _ => Value::String(raw.strip_prefix(ESCAPE).unwrap_or(raw).to_string()),
    }
}

/// One parsed key segment; `literal` segments were escaped and are never
/// read as array indices
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Segment {
    name: String,
    literal: bool,
}

fn split_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Segment {
        name: String::new(),
        literal: false,
    };
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => {
                current.literal = true;
                if let Some(next) = chars.next() {
                    current.name.push(next);
                }
            }
            '.' => segments.push(std::mem::replace(
                &mut current,
                Segment {
                    name: String::new(),
                    literal: false,
                },
            )),
            _ => current.name.push(c),
        }
    }
    segments.push(current);
    segments
}

enum Node {
    Leaf(Value),
    Branch(BTreeMap<Segment, Node>),
}

/// Rebuild structured values from dotted keys
///
/// Objects whose unescaped keys are exactly `0..n` become arrays. A key
/// that would descend through an existing scalar is kept verbatim at the
/// top level.
pub fn unflatten(props: &BTreeMap<String, String>) -> BTreeMap<String, Value> {
    let mut root: BTreeMap<Segment, Node> = BTreeMap::new();
    let mut verbatim = Vec::new();

    for (path, raw) in props {
        let leaf = unescape_leaf(raw);
        if let Err(leaf) = insert_path(&mut root, split_path(path), leaf) {
            verbatim.push((path.clone(), leaf));
        }
    }

    let mut out: BTreeMap<String, Value> = root
        .into_iter()
        .map(|(seg, node)| (seg.name, into_value(node)))
        .collect();
    for (path, leaf) in verbatim {
        out.entry(path).or_insert(leaf);
    }
    out
}

fn insert_path(
    root: &mut BTreeMap<Segment, Node>,
    segments: Vec<Segment>,
    leaf: Value,
) -> Result<(), Value> {
    let mut segments = segments.into_iter().peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            if current.contains_key(&segment) {
                return Err(leaf);
            }
            current.insert(segment, Node::Leaf(leaf));
            return Ok(());
        }
        let entry = current
            .entry(segment)
            .or_insert_with(|| Node::Branch(BTreeMap::new()));
        match entry {
            Node::Branch(children) => current = children,
            Node::Leaf(_) => return Err(leaf),
        }
    }
    Err(leaf)
}

fn into_value(node: Node) -> Value {
    let children = match node {
        Node::Leaf(value) => return value,
        Node::Branch(children) => children,
    };

    let indices: Option<Vec<usize>> = children
        .keys()
        .map(|seg| {
            if seg.literal {
                None
            } else {
                canonical_index(&seg.name)
            }
        })
        .collect();
    if let Some(mut idx) = indices {
        idx.sort_unstable();
        if idx.iter().enumerate().all(|(pos, i)| pos == *i) {
            let mut items: Vec<(usize, Value)> = children
                .into_iter()
                .filter_map(|(seg, node)| canonical_index(&seg.name).map(|i| (i, into_value(node))))
                .collect();
            items.sort_by_key(|(i, _)| *i);
            return Value::Array(items.into_iter().map(|(_, v)| v).collect());
        }
    }

    Value::Object(
        children
            .into_iter()
            .map(|(seg, node)| (seg.name, into_value(node)))
            .collect(),
    )
}

/// `"3"` is an index, `"03"` and `"x"` are not
fn canonical_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|i| i.to_string() == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn flat(key: &str, value: Value) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        flatten_into(&mut out, key, &value);
        out
    }

    #[test]
    fn arrays_use_index_keys() {
        let out = flat("partitions", json!(["dt", "region"]));
        assert_eq!(out.get("partitions.0").map(String::as_str), Some("dt"));
        assert_eq!(out.get("partitions.1").map(String::as_str), Some("region"));
    }

    #[test]
    fn nested_objects_use_dotted_keys() {
        let out = flat("serde", json!({"lib": "parquet", "params": {"compression": "snappy"}}));
        assert_eq!(out["serde.lib"], "parquet");
        assert_eq!(out["serde.params.compression"], "snappy");
    }

    #[test]
    fn scalars_are_stringified_and_nulls_dropped() {
        let out = flat("retention", json!(30));
        assert_eq!(out["retention"], "30");
        assert!(flat("gone", Value::Null).is_empty());
    }

    #[test]
    fn unflatten_rebuilds_arrays_and_objects() {
        let mut out = flat("tags", json!(["pii", "gold"]));
        flatten_into(&mut out, "params", &json!({"a": "1", "b": []}));
        flatten_into(&mut out, "owner", &json!("ops"));

        let back = unflatten(&out);
        assert_eq!(back["tags"], json!(["pii", "gold"]));
        assert_eq!(back["params"], json!({"a": "1", "b": []}));
        assert_eq!(back["owner"], json!("ops"));
    }

    #[test]
    fn unflatten_orders_indices_numerically() {
        let items: Vec<String> = (0..12).map(|i| format!("v{}", i)).collect();
        let out = flat("cols", json!(items));
        let back = unflatten(&out);
        assert_eq!(back["cols"][10], json!("v10"));
        assert_eq!(back["cols"][2], json!("v2"));
    }

    #[test]
    fn dotted_names_are_escaped() {
        let out = flat("spark.sql.provider", json!("parquet"));
        assert_eq!(out["spark\\.sql\\.provider"], "parquet");

        let back = unflatten(&out);
        assert_eq!(back["spark.sql.provider"], json!("parquet"));
        assert!(!back.contains_key("spark"));
    }

    #[test]
    fn container_literals_in_strings_survive() {
        let mut out = flat("marker", json!("[]"));
        flatten_into(&mut out, "brace", &json!("{}"));
        flatten_into(&mut out, "path", &json!("\\\\share\\x"));
        flatten_into(&mut out, "empty", &json!([]));

        let back = unflatten(&out);
        assert_eq!(back["marker"], json!("[]"));
        assert_eq!(back["brace"], json!("{}"));
        assert_eq!(back["path"], json!("\\\\share\\x"));
        assert_eq!(back["empty"], json!([]));
    }

    #[test]
    fn index_like_object_keys_stay_objects() {
        let value = json!({"0": "zero", "1": {"a.b": ["x"]}});
        let back = unflatten(&flat("params", value.clone()));
        assert_eq!(back["params"], value);
    }

    #[test]
    fn dotted_key_under_scalar_is_kept_verbatim() {
        let mut props = BTreeMap::new();
        props.insert("a".to_string(), "x".to_string());
        props.insert("a.b".to_string(), "y".to_string());

        let back = unflatten(&props);
        assert_eq!(back["a"], json!("x"));
        assert_eq!(back["a.b"], json!("y"));
    }
}
