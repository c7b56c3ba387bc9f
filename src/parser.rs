//! Structure parser: raw file content → [`Structure`].
//!
//! Decision ladder:
//!
//! 1. Content that is already valid JSON is kept verbatim as the schema.
//! 2. Otherwise the generation service is asked to describe the fields as
//!    JSON ([`FIELD_EXTRACTION_PROMPT`]).
//! 3. A JSON payload is recovered from the response (code fence, brace
//!    span, repair, balanced-brace scan).
//! 4. If no JSON is found, the heuristic text extractor runs over the
//!    response, then over the original content.
//!
//! Parsing never fails past the heuristic stage: a service error or an
//! unusable response degrades to weaker guesses, at worst an
//! unstructured structure with no fields.

use std::path::Path;

use anyhow::{Context, Result};
use fieldmap_core::extract::{extract_with_pass, ExtractionPass};
use fieldmap_core::models::{SchemaShape, Structure};
use fieldmap_core::recover::recover_json;
use tracing::{debug, info, warn};

use crate::generation::GenerationService;

/// Instruction sent ahead of non-JSON content.
pub const FIELD_EXTRACTION_PROMPT: &str = "You are a data modelling assistant. \
Read the document below and identify every data field it describes. \
For each field give its name, its type (one of: string, number, integer, boolean, date, array, object) \
and a short description. Express nesting with dotted names such as address.city. \
Answer with JSON only, inside a ```json code block, shaped as \
{\"fields\": [{\"name\": \"...\", \"type\": \"...\", \"description\": \"...\"}]}.\n\nDocument:\n";

pub struct StructureParser<'a> {
    generator: &'a dyn GenerationService,
}

impl<'a> StructureParser<'a> {
    pub fn new(generator: &'a dyn GenerationService) -> Self {
        Self { generator }
    }

    /// Read a file and parse it. Only I/O errors surface.
    pub async fn parse_file(&self, path: &Path) -> Result<Structure> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self
            .parse(&filename, &path.to_string_lossy(), &content)
            .await)
    }

    /// Parse raw content into a structure. Never fails.
    pub async fn parse(&self, filename: &str, path: &str, raw_content: &str) -> Structure {
        if raw_content.trim().is_empty() {
            debug!(filename, "empty content, nothing to parse");
            return Structure::from_fields(filename, path, raw_content, Vec::new());
        }

        if let Ok(schema) = serde_json::from_str::<serde_json::Value>(raw_content) {
            let structure = Structure::from_json(filename, path, raw_content, schema);
            info!(filename, shape = ?structure.shape(), "parsed as json");
            return structure;
        }

        let prompt = format!("{}{}", FIELD_EXTRACTION_PROMPT, raw_content);
        debug!(filename, model = self.generator.model_name(), "asking for field extraction");
        match self.generator.generate(&prompt).await {
            Ok(response) => structure_from_generated(filename, path, raw_content, &response),
            Err(e) => {
                warn!(filename, error = %e, "field extraction service failed, using heuristics");
                heuristic_structure(filename, path, raw_content, None)
            }
        }
    }
}

/// Build a structure from a generation response (ladder steps 3 and 4).
///
/// `raw_content` is kept as the structure's content; `response` is only
/// mined for fields.
pub fn structure_from_generated(
    filename: &str,
    path: &str,
    raw_content: &str,
    response: &str,
) -> Structure {
    if let Some(recovered) = recover_json(response) {
        let structure = Structure::from_json(filename, path, raw_content, recovered.value);
        if structure.shape() != SchemaShape::Unstructured {
            info!(filename, stage = ?recovered.stage, shape = ?structure.shape(), "recovered json from response");
            return structure;
        }
    }
    heuristic_structure(filename, path, raw_content, Some(response))
}

fn heuristic_structure(
    filename: &str,
    path: &str,
    raw_content: &str,
    response: Option<&str>,
) -> Structure {
    if let Some(text) = response {
        let (extraction, pass) = extract_with_pass(text);
        if pass != ExtractionPass::Nothing {
            info!(filename, ?pass, fields = extraction.fields.len(), "heuristic fields from response");
            return Structure::from_fields(filename, path, raw_content, extraction.fields);
        }
    }

    let (extraction, pass) = extract_with_pass(raw_content);
    info!(filename, ?pass, fields = extraction.fields.len(), "heuristic fields from content");
    Structure::from_fields(filename, path, raw_content, extraction.fields)
}
