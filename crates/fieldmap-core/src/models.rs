//! Core data models used throughout fieldmap.
//!
//! These types represent the parsed structures, their embeddings, the
//! records held by the vector store, and the results of mapping and
//! enrichment requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field type assumed when nothing better is known.
pub const DEFAULT_FIELD_TYPE: &str = "string";

fn default_field_type() -> String {
    DEFAULT_FIELD_TYPE.to_string()
}

/// A named, typed, described leaf attribute of a data structure.
///
/// `name` may be a dotted path (`address.city`) for nested attributes.
/// Uniqueness within a structure is not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(alias = "field")]
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        field_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            description: description.into(),
        }
    }
}

/// Which shape of field source a structure carries.
///
/// Chosen once when the structure is built; each shape routes to exactly
/// one walker in [`crate::walker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaShape {
    /// Nested mapping whose leaves carry a `type` attribute.
    TypedSchema,
    /// Explicit flat list of [`Field`]s.
    FlatFieldList,
    /// Arbitrary JSON with no type metadata.
    RawObject,
    /// Nothing structured was recovered.
    Unstructured,
}

/// The normalized result of parsing one input document.
///
/// Immutable once produced: fields are private and only exposed through
/// accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    filename: String,
    path: String,
    raw_content: String,
    shape: SchemaShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<Field>,
}

impl Structure {
    /// Build a structure around a parsed JSON value, classifying its shape.
    ///
    /// `schema` keeps the value verbatim; a flat field list is additionally
    /// decoded into [`Structure::fields`].
    pub fn from_json(
        filename: impl Into<String>,
        path: impl Into<String>,
        raw_content: impl Into<String>,
        schema: Value,
    ) -> Self {
        let (shape, fields) = crate::walker::classify(&schema);
        Self {
            filename: filename.into(),
            path: path.into(),
            raw_content: raw_content.into(),
            shape,
            schema: Some(schema),
            fields,
        }
    }

    /// Build a structure from an already-extracted field list.
    ///
    /// An empty list yields an [`SchemaShape::Unstructured`] structure.
    pub fn from_fields(
        filename: impl Into<String>,
        path: impl Into<String>,
        raw_content: impl Into<String>,
        fields: Vec<Field>,
    ) -> Self {
        let shape = if fields.is_empty() {
            SchemaShape::Unstructured
        } else {
            SchemaShape::FlatFieldList
        };
        Self {
            filename: filename.into(),
            path: path.into(),
            raw_content: raw_content.into(),
            shape,
            schema: None,
            fields,
        }
    }

    /// Reassemble a structure from persisted parts without re-classifying.
    pub fn from_parts(
        filename: String,
        path: String,
        raw_content: String,
        shape: SchemaShape,
        schema: Option<Value>,
        fields: Vec<Field>,
    ) -> Self {
        Self {
            filename,
            path,
            raw_content,
            shape,
            schema,
            fields,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    pub fn shape(&self) -> SchemaShape {
        self.shape
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// One field of a structure together with the text that was embedded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEmbedding {
    pub field: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A structure augmented with its field vectors and whole-document vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedStructure {
    pub structure: Structure,
    pub fields: Vec<FieldEmbedding>,
    pub document_vector: Vec<f32>,
}

/// What a [`VectorRecord`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Document,
    Field,
}

/// A vector plus the metadata needed to trace it back to its source.
///
/// `field_name` is present iff `kind` is [`RecordKind::Field`]; the
/// constructors enforce that.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub vector: Vec<f32>,
    pub kind: RecordKind,
    pub field_name: Option<String>,
    pub source_filename: String,
    pub source_path: String,
}

impl VectorRecord {
    pub fn document(vector: Vec<f32>, source_filename: &str, source_path: &str) -> Self {
        Self {
            vector,
            kind: RecordKind::Document,
            field_name: None,
            source_filename: source_filename.to_string(),
            source_path: source_path.to_string(),
        }
    }

    pub fn field(
        vector: Vec<f32>,
        field_name: &str,
        source_filename: &str,
        source_path: &str,
    ) -> Self {
        Self {
            vector,
            kind: RecordKind::Field,
            field_name: Some(field_name.to_string()),
            source_filename: source_filename.to_string(),
            source_path: source_path.to_string(),
        }
    }
}

/// A candidate target field with its similarity to the source field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCandidate {
    pub target_field: String,
    /// Cosine similarity, clamped to `[0, 1]`.
    pub confidence: f32,
}

/// Ranked correspondence from one source field to candidate target fields.
///
/// `target_candidates` is sorted by confidence, highest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub source_field: String,
    pub target_candidates: Vec<TargetCandidate>,
}

impl Mapping {
    pub fn best(&self) -> Option<&TargetCandidate> {
        self.target_candidates.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantDocument {
    pub filename: String,
    pub path: String,
    pub similarity: f32,
    /// Leading excerpt of the document content, empty if it could not be read.
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantField {
    pub source_document: String,
    pub source_path: String,
    pub field: String,
    pub similarity: f32,
    /// Description recovered from the source document, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of a knowledge-retrieval request against the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub relevant_documents: Vec<RelevantDocument>,
    pub relevant_fields: Vec<RelevantField>,
    pub synthesized_knowledge: String,
    pub re_extracted_structure: Structure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_deserialize_defaults_type() {
        let f: Field = serde_json::from_value(json!({ "name": "email" })).unwrap();
        assert_eq!(f.field_type, "string");
        assert_eq!(f.description, "");
    }

    #[test]
    fn test_field_accepts_field_alias() {
        let f: Field =
            serde_json::from_value(json!({ "field": "id", "type": "integer" })).unwrap();
        assert_eq!(f.name, "id");
        assert_eq!(f.field_type, "integer");
    }

    #[test]
    fn test_from_fields_empty_is_unstructured() {
        let s = Structure::from_fields("a.txt", "/tmp/a.txt", "", Vec::new());
        assert_eq!(s.shape(), SchemaShape::Unstructured);
        assert!(s.schema().is_none());
    }

    #[test]
    fn test_vector_record_field_name_iff_field_kind() {
        let d = VectorRecord::document(vec![1.0], "a.json", "/a.json");
        assert_eq!(d.kind, RecordKind::Document);
        assert!(d.field_name.is_none());

        let f = VectorRecord::field(vec![1.0], "id", "a.json", "/a.json");
        assert_eq!(f.kind, RecordKind::Field);
        assert_eq!(f.field_name.as_deref(), Some("id"));
    }
}
