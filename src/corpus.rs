//! Persisted vector corpus.
//!
//! The corpus is a single JSON document holding every embedded structure
//! produced by a `load`. Reloading it rebuilds the vector store without
//! calling the embedding service again.
//!
//! ```json
//! {
//!   "version": 1,
//!   "savedAt": "2026-01-01T00:00:00Z",
//!   "structures": [
//!     {
//!       "filename": "customer.json",
//!       "path": "/data/customer.json",
//!       "content": "...",
//!       "contentHash": "<sha256 hex>",
//!       "shape": "typedSchema",
//!       "schema": { ... },
//!       "embeddings": {
//!         "fields": [{ "field": "id", "text": "id: (integer)", "vector": [...] }],
//!         "fullContent": [...]
//!       }
//!     }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use fieldmap_core::models::{EmbeddedStructure, Field, FieldEmbedding, SchemaShape, Structure};
use fieldmap_core::store::VectorIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::mapper::insert_embedded;

/// Format version written by [`save_corpus`].
pub const CORPUS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub structures: Vec<CorpusEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusEntry {
    pub filename: String,
    pub path: String,
    pub content: String,
    pub content_hash: String,
    pub shape: SchemaShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    pub embeddings: CorpusEmbeddings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusEmbeddings {
    pub fields: Vec<FieldEmbedding>,
    pub full_content: Vec<f32>,
}

/// SHA-256 of the content, lowercase hex.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

impl CorpusEntry {
    pub fn from_embedded(embedded: &EmbeddedStructure) -> Self {
        let s = &embedded.structure;
        Self {
            filename: s.filename().to_string(),
            path: s.path().to_string(),
            content: s.raw_content().to_string(),
            content_hash: content_hash(s.raw_content()),
            shape: s.shape(),
            schema: s.schema().cloned(),
            fields: s.fields().to_vec(),
            embeddings: CorpusEmbeddings {
                fields: embedded.fields.clone(),
                full_content: embedded.document_vector.clone(),
            },
        }
    }

    pub fn into_embedded(self) -> EmbeddedStructure {
        let structure = Structure::from_parts(
            self.filename,
            self.path,
            self.content,
            self.shape,
            self.schema,
            self.fields,
        );
        EmbeddedStructure {
            structure,
            fields: self.embeddings.fields,
            document_vector: self.embeddings.full_content,
        }
    }
}

impl Corpus {
    /// Snapshot embedded structures, sorted by path.
    pub fn from_structures(structures: &[EmbeddedStructure]) -> Self {
        let mut entries: Vec<CorpusEntry> =
            structures.iter().map(CorpusEntry::from_embedded).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            version: CORPUS_VERSION,
            saved_at: Utc::now(),
            structures: entries,
        }
    }

    /// Snapshot a load of `root`: entries of `previous` under `root` are
    /// replaced by `structures`, entries loaded from elsewhere are kept.
    ///
    /// `root` and the stored paths are compared component-wise, so both
    /// should be canonical.
    pub fn replace_under(
        previous: Option<Corpus>,
        root: &Path,
        structures: &[EmbeddedStructure],
    ) -> Self {
        let mut corpus = Self::from_structures(structures);
        if let Some(previous) = previous {
            corpus.structures.extend(
                previous
                    .structures
                    .into_iter()
                    .filter(|e| !Path::new(&e.path).starts_with(root)),
            );
            corpus.structures.sort_by(|a, b| a.path.cmp(&b.path));
        }
        corpus
    }

    /// The entry for `path` if its stored hash matches `hash`.
    pub fn unchanged(&self, path: &str, hash: &str) -> Option<&CorpusEntry> {
        self.structures
            .iter()
            .find(|e| e.path == path && e.content_hash == hash)
    }
}

pub fn save_corpus(path: &Path, corpus: &Corpus) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create corpus directory: {}", parent.display())
            })?;
        }
    }
    let json = serde_json::to_string_pretty(corpus)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write corpus: {}", path.display()))?;
    info!(path = %path.display(), structures = corpus.structures.len(), "corpus saved");
    Ok(())
}

/// Read a corpus. A missing file is `Ok(None)`.
pub fn load_corpus(path: &Path) -> Result<Option<Corpus>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus: {}", path.display()))?;
    let corpus: Corpus = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus: {}", path.display()))?;
    if corpus.version != CORPUS_VERSION {
        bail!(
            "Unsupported corpus version {} in {} (expected {})",
            corpus.version,
            path.display(),
            CORPUS_VERSION
        );
    }
    Ok(Some(corpus))
}

/// Re-insert every persisted structure into `store`.
///
/// Dimensionality is re-checked by the store on every insert.
pub fn rebuild_store<S>(corpus: Corpus, store: &mut S) -> Result<Vec<EmbeddedStructure>>
where
    S: VectorIndex + ?Sized,
{
    let mut structures = Vec::with_capacity(corpus.structures.len());
    for entry in corpus.structures {
        let embedded = entry.into_embedded();
        insert_embedded(store, &embedded).with_context(|| {
            format!(
                "Failed to restore '{}' into the vector store",
                embedded.structure.path()
            )
        })?;
        structures.push(embedded);
    }
    info!(structures = structures.len(), records = store.len(), "vector store rebuilt");
    Ok(structures)
}
