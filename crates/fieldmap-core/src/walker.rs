//! Schema walkers: flatten a structure into `(path, embedding text)` pairs.
//!
//! Three shapes carry fields, each with its own walker:
//!
//! | Shape | Walker | Leaf text |
//! |-------|--------|-----------|
//! | [`SchemaShape::TypedSchema`] | [`flatten_typed_schema`] | `path: description (type)` |
//! | [`SchemaShape::FlatFieldList`] | [`flatten_field_list`] | `name: description (type)` |
//! | [`SchemaShape::RawObject`] | [`flatten_raw_object`] | `path: value` |
//!
//! Nested mappings contribute dot-joined path prefixes (`address.city`).
//! Arrays whose first element is an object are walked under `path[0]`.

use serde_json::{Map, Value};

use crate::models::{Field, SchemaShape, DEFAULT_FIELD_TYPE};

/// One flattened field and the text that represents it for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldText {
    pub path: String,
    pub text: String,
}

impl FieldText {
    fn new(path: String, text: String) -> Self {
        Self { path, text }
    }
}

/// Decide which shape a parsed JSON value has.
///
/// A `fields` array (or a top-level array) of objects with a `name` or
/// `field` key is a flat field list and is decoded here. Any value in which
/// some nested object carries a string `type` is a typed schema. Other
/// objects and arrays are raw objects; bare scalars are unstructured.
pub fn classify(value: &Value) -> (SchemaShape, Vec<Field>) {
    let list = match value {
        Value::Object(map) => map.get("fields").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };
    if let Some(items) = list {
        let fields = decode_field_list(items);
        if !fields.is_empty() {
            return (SchemaShape::FlatFieldList, fields);
        }
    }

    if has_typed_node(value) {
        return (SchemaShape::TypedSchema, Vec::new());
    }

    match value {
        Value::Object(_) | Value::Array(_) => (SchemaShape::RawObject, Vec::new()),
        _ => (SchemaShape::Unstructured, Vec::new()),
    }
}

fn decode_field_list(items: &[Value]) -> Vec<Field> {
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let name = obj
                .get("name")
                .or_else(|| obj.get("field"))
                .and_then(Value::as_str)?
                .trim();
            if name.is_empty() {
                return None;
            }
            let field_type = obj
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_FIELD_TYPE);
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(Field::new(name, field_type, description))
        })
        .collect()
}

fn has_typed_node(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().any(|child| match child {
            Value::Object(inner) => {
                inner.get("type").map(Value::is_string).unwrap_or(false) || has_typed_node(child)
            }
            Value::Array(_) => has_typed_node(child),
            _ => false,
        }),
        Value::Array(items) => items.first().map(has_typed_node).unwrap_or(false),
        _ => false,
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn leaf_text(path: &str, description: &str, field_type: &str) -> String {
    if description.is_empty() {
        format!("{}: ({})", path, field_type)
    } else {
        format!("{}: {} ({})", path, description, field_type)
    }
}

const SCHEMA_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "title",
    "description",
    "properties",
    "required",
    "additionalProperties",
    "definitions",
    "$defs",
];

/// JSON-Schema style `properties` of an object node, if it has them.
///
/// Untyped nodes only qualify when every key is a schema keyword, so a
/// data field that happens to be named `properties` is not swallowed.
fn properties_of(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    let is_object_type = match map.get("type") {
        None => map.keys().all(|k| SCHEMA_KEYWORDS.contains(&k.as_str())),
        Some(t) => t.as_str() == Some("object"),
    };
    if is_object_type {
        map.get("properties").and_then(Value::as_object)
    } else {
        None
    }
}

/// Flatten a typed schema.
///
/// A node with a string `type` is a leaf field. A sequence is an array
/// field (`path: Array of items`) and its first element, if an object, is
/// walked under `path[0]`. Other mappings are walked without being
/// recorded themselves. JSON-Schema `properties` blocks are walked
/// through transparently.
pub fn flatten_typed_schema(schema: &Value) -> Vec<FieldText> {
    let mut out = Vec::new();
    match schema {
        Value::Object(map) => walk_typed(map, "", &mut out),
        Value::Array(items) => {
            if let Some(Value::Object(first)) = items.first() {
                walk_typed(first, "", &mut out);
            }
        }
        _ => {}
    }
    out
}

fn walk_typed(map: &Map<String, Value>, prefix: &str, out: &mut Vec<FieldText>) {
    let entries = properties_of(map).unwrap_or(map);

    for (key, value) in entries {
        let path = join(prefix, key);
        match value {
            Value::Object(node) => match node.get("type").and_then(Value::as_str) {
                Some(field_type) => {
                    if let Some(props) = properties_of(node) {
                        walk_typed(props, &path, out);
                        continue;
                    }
                    let description = node
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    out.push(FieldText::new(
                        path.clone(),
                        leaf_text(&path, description, field_type),
                    ));
                    if field_type == "array" {
                        if let Some(Value::Object(items)) = node.get("items") {
                            if let Some(props) = properties_of(items) {
                                walk_typed(props, &format!("{}[0]", path), out);
                            }
                        }
                    }
                }
                None => walk_typed(node, &path, out),
            },
            Value::Array(items) => {
                out.push(FieldText::new(
                    path.clone(),
                    format!("{}: Array of items", path),
                ));
                if let Some(Value::Object(first)) = items.first() {
                    walk_typed(first, &format!("{}[0]", path), out);
                }
            }
            _ => {}
        }
    }
}

/// Flatten an arbitrary JSON object with no type metadata.
///
/// Every nested mapping is walked; every other value (arrays included) is
/// a leaf whose text is `path: value`, with arrays rendered as `Array`.
pub fn flatten_raw_object(value: &Value) -> Vec<FieldText> {
    let mut out = Vec::new();
    match value {
        Value::Object(map) => walk_raw(map, "", &mut out),
        Value::Array(items) => {
            if let Some(Value::Object(first)) = items.first() {
                walk_raw(first, "", &mut out);
            }
        }
        _ => {}
    }
    out
}

fn walk_raw(map: &Map<String, Value>, prefix: &str, out: &mut Vec<FieldText>) {
    for (key, value) in map {
        let path = join(prefix, key);
        match value {
            Value::Object(node) => walk_raw(node, &path, out),
            other => {
                let rendered = match other {
                    Value::Array(_) => "Array".to_string(),
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                };
                out.push(FieldText::new(path.clone(), format!("{}: {}", path, rendered)));
            }
        }
    }
}

/// Flatten an explicit field list.
pub fn flatten_field_list(fields: &[Field]) -> Vec<FieldText> {
    fields
        .iter()
        .map(|f| {
            FieldText::new(
                f.name.clone(),
                leaf_text(&f.name, &f.description, &f.field_type),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(texts: &[FieldText]) -> Vec<&str> {
        texts.iter().map(|t| t.path.as_str()).collect()
    }

    #[test]
    fn test_typed_nested_object_uses_dotted_path() {
        let schema = json!({ "address": { "city": { "type": "string" } } });
        let out = flatten_typed_schema(&schema);
        assert_eq!(paths(&out), vec!["address.city"]);
        assert_eq!(out[0].text, "address.city: (string)");
    }

    #[test]
    fn test_typed_leaf_text_includes_description() {
        let schema = json!({ "email": { "type": "string", "description": "contact email" } });
        let out = flatten_typed_schema(&schema);
        assert_eq!(out[0].text, "email: contact email (string)");
    }

    #[test]
    fn test_typed_array_walks_first_element() {
        let schema = json!({
            "orders": [ { "sku": { "type": "string" }, "qty": { "type": "integer" } } ]
        });
        let out = flatten_typed_schema(&schema);
        assert_eq!(paths(&out), vec!["orders", "orders[0].sku", "orders[0].qty"]);
        assert_eq!(out[0].text, "orders: Array of items");
    }

    #[test]
    fn test_typed_json_schema_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "description": "primary key" },
                "address": {
                    "type": "object",
                    "properties": { "zip": { "type": "string" } }
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "object", "properties": { "label": { "type": "string" } } }
                }
            }
        });
        let out = flatten_typed_schema(&schema);
        assert_eq!(
            paths(&out),
            vec!["id", "address.zip", "tags", "tags[0].label"]
        );
    }

    #[test]
    fn test_raw_object_walk() {
        let value = json!({
            "customer": { "name": "Ada", "age": 36 },
            "tags": ["a", "b"],
            "active": true
        });
        let out = flatten_raw_object(&value);
        let texts: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "customer.name: Ada",
                "customer.age: 36",
                "tags: Array",
                "active: true"
            ]
        );
    }

    #[test]
    fn test_classify_flat_field_list() {
        let value = json!({ "fields": [
            { "name": "id", "type": "integer", "description": "key" },
            { "field": "email" },
            { "description": "nameless, skipped" }
        ]});
        let (shape, fields) = classify(&value);
        assert_eq!(shape, SchemaShape::FlatFieldList);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name, "email");
        assert_eq!(fields[1].field_type, "string");
    }

    #[test]
    fn test_classify_typed_and_raw() {
        let (shape, _) = classify(&json!({ "a": { "b": { "type": "number" } } }));
        assert_eq!(shape, SchemaShape::TypedSchema);

        let (shape, _) = classify(&json!({ "a": { "b": 1 } }));
        assert_eq!(shape, SchemaShape::RawObject);

        let (shape, _) = classify(&json!(42));
        assert_eq!(shape, SchemaShape::Unstructured);
    }

    #[test]
    fn test_field_list_text() {
        let fields = vec![Field::new("CustomerID", "string", "unique identifier")];
        let out = flatten_field_list(&fields);
        assert_eq!(out[0].text, "CustomerID: unique identifier (string)");
    }
}
