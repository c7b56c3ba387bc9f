//! Mapper and enrichment engine.
//!
//! Ties the parser output, the embedding adapter and a [`VectorIndex`]
//! together:
//!
//! - [`Mapper::embed_structure`] embeds every field plus the whole
//!   document and appends the vectors to the store.
//! - [`Mapper::map_structures`] ranks, for each source field, the target
//!   structure's fields by cosine similarity.
//! - [`Mapper::extract_knowledge`] retrieves documents and fields related
//!   to a free-text query and asks the generation service to synthesize
//!   them.
//!
//! The store is passed in explicitly. Embedding takes `&mut`, so a store
//! has one writer at a time; sharing it between mappers running
//! concurrently is the caller's job (wrap it in a lock).

use std::collections::HashMap;

use fieldmap_core::models::{
    EmbeddedStructure, EnrichmentResult, FieldEmbedding, Mapping, RecordKind, RelevantDocument,
    RelevantField, SchemaShape, Structure, TargetCandidate, VectorRecord,
};
use fieldmap_core::store::{RecordFilter, RecordHit, VectorIndex};
use fieldmap_core::walker::{
    flatten_field_list, flatten_raw_object, flatten_typed_schema, FieldText,
};
use fieldmap_core::{extract, MapError, Result};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::{embed_batch, embed_text, EmbeddingService};
use crate::generation::GenerationService;
use crate::parser::structure_from_generated;

static DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""description"\s*:\s*"([^"]*)""#).unwrap());

/// Characters of each retrieved document passed along as an excerpt.
const EXCERPT_CHARS: usize = 600;

const SYNTHESIS_PROMPT: &str = "You are a data modelling assistant. \
Using only the related documents and fields below, summarise what is known about the data \
structures relevant to the query. List the relevant fields with their types and descriptions \
as JSON inside a ```json code block shaped as \
{\"fields\": [{\"name\": \"...\", \"type\": \"...\", \"description\": \"...\"}]}, \
followed by a short explanation.\n\n";

const COMMENTARY_PROMPT: &str = "You are reviewing a proposed field mapping between two data \
structures. The similarity scores were computed from embeddings and are final. Point out \
mappings that look wrong, fields with no good counterpart, and any transformation a developer \
would need (type conversion, splitting, joining), using the prior context where it helps.\n\n";

/// Tunables for a [`Mapper`].
#[derive(Debug, Clone)]
pub struct MapperSettings {
    /// Concurrent embedding requests per chunk.
    pub batch_size: usize,
    /// Candidates kept per source field.
    pub top_candidates: usize,
    /// Run knowledge retrieval and commentary in [`Mapper::map_with_context`].
    pub enrich: bool,
    /// `top_k` used for that retrieval.
    pub context_top_k: usize,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            batch_size: 8,
            top_candidates: 3,
            enrich: false,
            context_top_k: 3,
        }
    }
}

impl From<&Config> for MapperSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.embedding.batch_size,
            top_candidates: config.mapping.top_candidates,
            enrich: config.mapping.enrich,
            context_top_k: config.mapping.context_top_k,
        }
    }
}

/// Mappings plus the optional advisory context gathered alongside them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingReport {
    pub mappings: Vec<Mapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<EnrichmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
}

pub struct Mapper<'a> {
    embedder: &'a dyn EmbeddingService,
    generator: &'a dyn GenerationService,
    settings: MapperSettings,
}

/// The `(path, text)` pairs to embed for a structure.
///
/// Exactly one walker runs, chosen by the structure's shape. If it yields
/// nothing, the heuristic text extractor runs over the raw content.
pub fn structure_field_texts(structure: &Structure) -> Vec<FieldText> {
    let texts = match (structure.shape(), structure.schema()) {
        (SchemaShape::TypedSchema, Some(schema)) => flatten_typed_schema(schema),
        (SchemaShape::FlatFieldList, _) => flatten_field_list(structure.fields()),
        (SchemaShape::RawObject, Some(schema)) => flatten_raw_object(schema),
        _ => Vec::new(),
    };
    if !texts.is_empty() {
        return texts;
    }

    let extraction = extract::extract_fields_from_text(structure.raw_content());
    flatten_field_list(&extraction.fields)
}

impl<'a> Mapper<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingService,
        generator: &'a dyn GenerationService,
        settings: MapperSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            settings,
        }
    }

    /// Embed a structure's fields and full content, appending them to `store`.
    ///
    /// All vectors are checked against the store's dimensionality before
    /// the first insert, so a mismatch leaves the store untouched.
    pub async fn embed_structure<S>(
        &self,
        store: &mut S,
        structure: Structure,
    ) -> Result<EmbeddedStructure>
    where
        S: VectorIndex + ?Sized,
    {
        let texts = structure_field_texts(&structure);
        let field_vectors = if texts.is_empty() {
            Vec::new()
        } else {
            let inputs: Vec<String> = texts.iter().map(|t| t.text.clone()).collect();
            embed_batch(self.embedder, &inputs, self.settings.batch_size).await?
        };
        let document_vector = embed_text(self.embedder, structure.raw_content()).await?;

        let expected = store.dims().unwrap_or(document_vector.len());
        for vector in field_vectors.iter().chain(std::iter::once(&document_vector)) {
            if vector.len() != expected {
                return Err(MapError::DimensionMismatch {
                    operation: "embed_structure",
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let fields: Vec<FieldEmbedding> = texts
            .into_iter()
            .zip(field_vectors)
            .map(|(t, vector)| FieldEmbedding {
                field: t.path,
                text: t.text,
                vector,
            })
            .collect();

        let embedded = EmbeddedStructure {
            structure,
            fields,
            document_vector,
        };
        insert_embedded(store, &embedded)?;

        info!(
            filename = embedded.structure.filename(),
            fields = embedded.fields.len(),
            model = self.embedder.model_name(),
            "embedded structure"
        );
        Ok(embedded)
    }

    /// Propose target candidates for every source field.
    ///
    /// Candidates come from `target`'s field records in `store`, best
    /// first. Confidence is the cosine similarity, clamped at zero.
    ///
    /// # Errors
    ///
    /// [`MapError::NotInitialized`] if the store is empty.
    pub fn map_structures<S>(
        &self,
        store: &S,
        source: &EmbeddedStructure,
        target: &EmbeddedStructure,
    ) -> Result<Vec<Mapping>>
    where
        S: VectorIndex + ?Sized,
    {
        if store.is_empty() {
            return Err(MapError::NotInitialized {
                operation: "map_structures",
            });
        }

        let filter = RecordFilter::fields_of(target.structure.path());
        let mut mappings = Vec::with_capacity(source.fields.len());

        for field in &source.fields {
            let hits = store.query(&field.vector, &filter, self.settings.top_candidates)?;
            let target_candidates = hits
                .into_iter()
                .filter_map(|hit| {
                    Some(TargetCandidate {
                        target_field: hit.field_name?,
                        confidence: hit.score.max(0.0),
                    })
                })
                .collect();
            mappings.push(Mapping {
                source_field: field.field.clone(),
                target_candidates,
            });
        }

        debug!(
            source = source.structure.filename(),
            target = target.structure.filename(),
            mappings = mappings.len(),
            "mapped structures"
        );
        Ok(mappings)
    }

    /// [`map_structures`](Self::map_structures), plus advisory context when
    /// enrichment is enabled.
    ///
    /// The retrieved knowledge and the generated commentary never change
    /// the computed mappings.
    pub async fn map_with_context<S>(
        &self,
        store: &S,
        source: &EmbeddedStructure,
        target: &EmbeddedStructure,
    ) -> Result<MappingReport>
    where
        S: VectorIndex + ?Sized,
    {
        let mappings = self.map_structures(store, source, target)?;
        if !self.settings.enrich {
            return Ok(MappingReport {
                mappings,
                knowledge: None,
                commentary: None,
            });
        }

        let query = format!(
            "{}\n\n{}",
            source.structure.raw_content(),
            target.structure.raw_content()
        );
        let knowledge = self
            .extract_knowledge(store, &query, self.settings.context_top_k)
            .await?;

        let prompt = format!(
            "{}Source: {}\nTarget: {}\n\nProposed mapping:\n{}\nPrior context:\n{}",
            COMMENTARY_PROMPT,
            source.structure.filename(),
            target.structure.filename(),
            format_mapping_table(&mappings),
            knowledge.synthesized_knowledge
        );
        let commentary = self.generator.generate(&prompt).await?;

        Ok(MappingReport {
            mappings,
            knowledge: Some(knowledge),
            commentary: Some(commentary),
        })
    }

    /// Retrieve and synthesize what the store knows about `query`.
    ///
    /// Fetches the `top_k` closest documents and `2 * top_k` closest fields
    /// independently, re-reads the matched files to recover field
    /// descriptions, and asks the generation service for a synthesis that
    /// is then re-parsed into a best-effort structure.
    ///
    /// # Errors
    ///
    /// - [`MapError::NotInitialized`] if the store is empty.
    /// - [`MapError::InvalidInput`] for an empty query or `top_k == 0`.
    /// - [`MapError::Service`] from embedding or generation.
    pub async fn extract_knowledge<S>(
        &self,
        store: &S,
        query: &str,
        top_k: usize,
    ) -> Result<EnrichmentResult>
    where
        S: VectorIndex + ?Sized,
    {
        if store.is_empty() {
            return Err(MapError::NotInitialized {
                operation: "extract_knowledge",
            });
        }
        if top_k == 0 {
            return Err(MapError::invalid_input("extract_knowledge", "top_k must be >= 1"));
        }

        let query_vec = embed_text(self.embedder, query).await?;
        let doc_hits = store.query(&query_vec, &RecordFilter::kind(RecordKind::Document), top_k)?;
        let field_hits =
            store.query(&query_vec, &RecordFilter::kind(RecordKind::Field), top_k * 2)?;

        let contents = read_sources(doc_hits.iter().chain(field_hits.iter())).await;

        let relevant_documents: Vec<RelevantDocument> = doc_hits
            .iter()
            .map(|hit| RelevantDocument {
                filename: hit.source_filename.clone(),
                path: hit.source_path.clone(),
                similarity: hit.score,
                excerpt: contents
                    .get(hit.source_path.as_str())
                    .map(|c| excerpt(c))
                    .unwrap_or_default(),
            })
            .collect();

        let relevant_fields = group_fields(&field_hits, &contents);

        let prompt = synthesis_prompt(query, &relevant_documents, &relevant_fields);
        let synthesized_knowledge = self.generator.generate(&prompt).await?;
        let re_extracted_structure = structure_from_generated(
            "synthesized-knowledge",
            "",
            &synthesized_knowledge,
            &synthesized_knowledge,
        );

        info!(
            documents = relevant_documents.len(),
            fields = relevant_fields.len(),
            "knowledge extracted"
        );

        Ok(EnrichmentResult {
            relevant_documents,
            relevant_fields,
            synthesized_knowledge,
            re_extracted_structure,
        })
    }
}

/// Append a structure's field records and document record to `store`.
pub fn insert_embedded<S>(store: &mut S, embedded: &EmbeddedStructure) -> Result<()>
where
    S: VectorIndex + ?Sized,
{
    let filename = embedded.structure.filename();
    let path = embedded.structure.path();
    for field in &embedded.fields {
        store.insert(VectorRecord::field(
            field.vector.clone(),
            &field.field,
            filename,
            path,
        ))?;
    }
    store.insert(VectorRecord::document(
        embedded.document_vector.clone(),
        filename,
        path,
    ))
}

/// Read every distinct source path concurrently. Unreadable files are
/// logged and left out.
async fn read_sources<'h>(hits: impl Iterator<Item = &'h RecordHit>) -> HashMap<String, String> {
    let mut paths: Vec<String> = Vec::new();
    for hit in hits {
        if !hit.source_path.is_empty() && !paths.contains(&hit.source_path) {
            paths.push(hit.source_path.clone());
        }
    }

    let reads = paths.into_iter().map(|path| async move {
        let result = tokio::fs::read_to_string(&path).await;
        (path, result)
    });

    let mut contents = HashMap::new();
    for (path, result) in join_all(reads).await {
        match result {
            Ok(content) => {
                contents.insert(path, content);
            }
            Err(e) => warn!(path = %path, error = %e, "could not re-read source document"),
        }
    }
    contents
}

fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHARS).collect()
}

/// Group field hits by source document, documents in order of their best
/// field, fields in score order within a document.
fn group_fields(hits: &[RecordHit], contents: &HashMap<String, String>) -> Vec<RelevantField> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RecordHit>> = HashMap::new();
    for hit in hits {
        let key = hit.source_path.as_str();
        if !groups.contains_key(key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(hit);
    }

    let mut out = Vec::with_capacity(hits.len());
    for key in order {
        let content = contents.get(key);
        for hit in groups.remove(key).unwrap_or_default() {
            let field = hit.field_name.clone().unwrap_or_default();
            let description = content.and_then(|c| find_field_description(c, &field));
            out.push(RelevantField {
                source_document: hit.source_filename.clone(),
                source_path: hit.source_path.clone(),
                field,
                similarity: hit.score,
                description,
            });
        }
    }
    out
}

/// Best-effort search for the text following a field's name in `content`.
///
/// Dotted and indexed paths are reduced to their last segment. When the
/// name introduces a JSON object, only that object is searched for a
/// `"description"`; a quoted value yields its contents; anything else
/// yields the rest of the line.
pub fn find_field_description(content: &str, field: &str) -> Option<String> {
    let leaf = field
        .rsplit('.')
        .next()
        .unwrap_or(field)
        .trim_end_matches("[0]");
    if leaf.is_empty() {
        return None;
    }

    let pattern = format!(
        r#"(?m)(?:^|[^A-Za-z0-9_])["']?{}["']?[ \t]*[:=-][ \t]*"#,
        regex::escape(leaf)
    );
    let re = Regex::new(&pattern).ok()?;
    let rest = &content[re.find(content)?.end()..];

    let text = if rest.starts_with('{') {
        let object = leading_object(rest)?;
        DESCRIPTION_RE.captures(object)?[1].to_string()
    } else if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next().unwrap_or_default().to_string()
    } else {
        rest.lines()
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches([',', '{', '['])
            .trim()
            .to_string()
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The balanced `{...}` span at the start of `text`, ignoring braces
/// inside strings.
fn leading_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn synthesis_prompt(
    query: &str,
    documents: &[RelevantDocument],
    fields: &[RelevantField],
) -> String {
    let mut prompt = String::from(SYNTHESIS_PROMPT);
    prompt.push_str("Query:\n");
    prompt.push_str(query);
    prompt.push_str("\n\nRelated documents:\n");
    for doc in documents {
        prompt.push_str(&format!(
            "--- {} (similarity {:.3})\n{}\n",
            doc.filename, doc.similarity, doc.excerpt
        ));
    }
    prompt.push_str("\nRelated fields:\n");
    for field in fields {
        match &field.description {
            Some(d) => prompt.push_str(&format!(
                "- {} [{}]: {}\n",
                field.field, field.source_document, d
            )),
            None => prompt.push_str(&format!("- {} [{}]\n", field.field, field.source_document)),
        }
    }
    prompt
}

/// One line per source field: `source -> target (0.912), ...`.
pub fn format_mapping_table(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    for mapping in mappings {
        let candidates: Vec<String> = mapping
            .target_candidates
            .iter()
            .map(|c| format!("{} ({:.3})", c.target_field, c.confidence))
            .collect();
        let rhs = if candidates.is_empty() {
            "(no candidates)".to_string()
        } else {
            candidates.join(", ")
        };
        out.push_str(&format!("{} -> {}\n", mapping.source_field, rhs));
    }
    out
}
