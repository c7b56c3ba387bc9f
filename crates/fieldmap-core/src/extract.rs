//! Heuristic field extraction from free text.
//!
//! Used as the terminal parser fallback and on its own for documents
//! with no recoverable JSON. Three passes run in order, each only when the
//! previous one found nothing:
//!
//! 1. **Labels**: `identifier:` tokens anywhere in the text; the
//!    description runs to the next label or the end of input.
//! 2. **Lines**: `name: description`, `name - description`, or a bulleted
//!    `- name: description`, with a strict identifier check on `name`.
//! 3. **Capitalized tokens**: bare `CamelCase` / `Capitalized` words.
//!
//! Extraction never fails; the worst case is an empty field list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{Field, DEFAULT_FIELD_TYPE};

/// Structural words that look like labels but never name a field.
const DENYLIST: &[&str] = &["document", "content", "field", "return", "struct"];

/// Description given to fields found by the capitalized-token pass.
pub const PLACEHOLDER_DESCRIPTION: &str = "Extracted without explicit description";

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(?:^|[\s,;{(\[])["']?([A-Za-z_][A-Za-z0-9_]*)["']?[ \t]*:"#).unwrap()
});
static TYPE_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(string|number|integer|float|boolean|date|array|object)\b").unwrap()
});
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
static DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+-\s+(.+)$").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s*([^:]+):\s*(.*)$").unwrap());
static CAPITALIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)*\b").unwrap());

/// Fields recovered from free text, alongside the text they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextExtraction {
    pub fields: Vec<Field>,
    pub raw: String,
}

/// Which heuristic pass produced a [`TextExtraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPass {
    Labels,
    Lines,
    CapitalizedTokens,
    Nothing,
}

/// Extract fields from free text, running the passes in order.
pub fn extract_fields_from_text(text: &str) -> TextExtraction {
    extract_with_pass(text).0
}

/// Like [`extract_fields_from_text`], also reporting the pass that won.
pub fn extract_with_pass(text: &str) -> (TextExtraction, ExtractionPass) {
    let passes: [(fn(&str) -> Vec<Field>, ExtractionPass); 3] = [
        (label_pass, ExtractionPass::Labels),
        (line_pass, ExtractionPass::Lines),
        (capitalized_pass, ExtractionPass::CapitalizedTokens),
    ];

    for (pass, kind) in passes {
        let fields = pass(text);
        if !fields.is_empty() {
            return (
                TextExtraction {
                    fields,
                    raw: text.to_string(),
                },
                kind,
            );
        }
    }

    (
        TextExtraction {
            fields: Vec::new(),
            raw: text.to_string(),
        },
        ExtractionPass::Nothing,
    )
}

/// Guess a field type from the first type word in its description.
pub fn infer_type(description: &str) -> String {
    match TYPE_WORD_RE.captures(description) {
        Some(caps) => match caps[1].to_lowercase().as_str() {
            "float" => "number".to_string(),
            other => other.to_string(),
        },
        None => DEFAULT_FIELD_TYPE.to_string(),
    }
}

fn is_denied(name: &str) -> bool {
    DENYLIST.iter().any(|w| w.eq_ignore_ascii_case(name))
}

fn clean_description(raw: &str) -> String {
    raw.trim()
        .trim_end_matches([',', ';', '}', ']', '-', '*'])
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn label_pass(text: &str) -> Vec<Field> {
    let labels: Vec<(usize, usize, &str)> = LABEL_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((whole.start(), whole.end(), name.as_str()))
        })
        .collect();

    let mut fields = Vec::new();
    for (i, (_, end, name)) in labels.iter().enumerate() {
        if is_denied(name) {
            continue;
        }
        let next_start = labels.get(i + 1).map(|l| l.0).unwrap_or(text.len());
        let raw_description = &text[*end..next_start.max(*end)];
        // `scheme://...` is a URL, not a label.
        if raw_description.starts_with("//") {
            continue;
        }
        let description = clean_description(raw_description);
        let field_type = infer_type(&description);
        fields.push(Field::new(*name, field_type, description));
    }
    fields
}

fn skip_line(line: &str) -> bool {
    line.is_empty()
        || line.chars().count() < 3
        || line.starts_with('#')
        || line.starts_with("---")
        || line.starts_with("//")
}

fn line_pass(text: &str) -> Vec<Field> {
    let mut fields = Vec::new();
    for line in text.lines().map(str::trim) {
        if skip_line(line) {
            continue;
        }
        if let Some((name, description)) = split_line(line) {
            if is_denied(&name) {
                continue;
            }
            let field_type = infer_type(&description);
            fields.push(Field::new(name, field_type, description));
        }
    }
    fields
}

/// Try colon, dash, then bullet splits; the first with a valid name wins.
fn split_line(line: &str) -> Option<(String, String)> {
    let valid = |name: &str| IDENTIFIER_RE.is_match(name);

    if let Some((name, description)) = line.split_once(':') {
        let name = name.trim();
        if valid(name) {
            return Some((name.to_string(), clean_description(description)));
        }
    }

    if let Some(caps) = DASH_RE.captures(line) {
        let name = caps[1].trim();
        if valid(name) {
            return Some((name.to_string(), clean_description(&caps[2])));
        }
    }

    if let Some(caps) = BULLET_RE.captures(line) {
        let name = caps[1].trim();
        if valid(name) {
            return Some((name.to_string(), clean_description(&caps[2])));
        }
    }

    None
}

fn capitalized_pass(text: &str) -> Vec<Field> {
    let mut seen = std::collections::HashSet::new();
    CAPITALIZED_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|name| !is_denied(name) && seen.insert(*name))
        .map(|name| Field::new(name, DEFAULT_FIELD_TYPE, PLACEHOLDER_DESCRIPTION))
        .collect()
}
