//! Recover a JSON payload from untrusted generated text.
//!
//! Generation services wrap JSON in prose, code fences, or emit slightly
//! broken JSON. [`recover_json`] tries, in order:
//!
//! 1. the contents of a fenced code block, else the span from the first
//!    `{` to the last `}`, after [`repair`];
//! 2. every balanced-brace substring of the text, longest first.
//!
//! Each failed attempt is a [`ParseRecoverable`] that is logged and
//! dropped; the caller falls back to heuristic extraction on `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?([\s\S]*?)```").unwrap());
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
static ADJACENT_OBJECTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*\{").unwrap());

/// Where in the ladder a payload was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    FencedBlock,
    BraceSpan,
    BalancedScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub stage: RecoveryStage,
}

/// A parse attempt that failed but leaves later stages to try.
#[derive(Debug)]
pub struct ParseRecoverable {
    pub stage: RecoveryStage,
    pub reason: String,
}

/// Locate, repair, and parse the JSON payload embedded in `text`.
pub fn recover_json(text: &str) -> Option<Recovered> {
    let (candidate, stage) = match fenced_block(text) {
        Some(block) => (block.to_string(), RecoveryStage::FencedBlock),
        None => match brace_span(text) {
            Some(span) => (span.to_string(), RecoveryStage::BraceSpan),
            None => (String::new(), RecoveryStage::BraceSpan),
        },
    };

    if !candidate.trim().is_empty() {
        match try_parse(&candidate, stage) {
            Ok(value) => return Some(Recovered { value, stage }),
            Err(e) => debug!(stage = ?e.stage, reason = %e.reason, "json recovery stage failed"),
        }
    }

    for span in balanced_spans(text) {
        if let Ok(value) = try_parse(span, RecoveryStage::BalancedScan) {
            return Some(Recovered {
                value,
                stage: RecoveryStage::BalancedScan,
            });
        }
    }

    debug!("no json payload recovered");
    None
}

fn try_parse(candidate: &str, stage: RecoveryStage) -> Result<Value, ParseRecoverable> {
    if let Ok(value) = serde_json::from_str(candidate.trim()) {
        return Ok(value);
    }
    serde_json::from_str(&repair(candidate)).map_err(|e| ParseRecoverable {
        stage,
        reason: e.to_string(),
    })
}

/// Contents of the first fenced code block, if any.
pub fn fenced_block(text: &str) -> Option<&str> {
    FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The largest brace-delimited span: first `{` through last `}`.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Lightweight repair of near-JSON.
///
/// Drops trailing commas before `}` / `]` and turns whitespace-separated
/// adjacent objects into a JSON array.
pub fn repair(candidate: &str) -> String {
    let trimmed = candidate.trim();
    let without_trailing = TRAILING_COMMA_RE.replace_all(trimmed, "$1");
    if ADJACENT_OBJECTS_RE.is_match(&without_trailing) {
        let merged = ADJACENT_OBJECTS_RE.replace_all(&without_trailing, "},{");
        if merged.starts_with('[') {
            merged.into_owned()
        } else {
            format!("[{}]", merged)
        }
    } else {
        without_trailing.into_owned()
    }
}

/// Every balanced `{...}` substring, longest first.
///
/// Braces inside string literals are ignored. Nested spans are included,
/// so an outer object that fails to parse still leaves its inner objects.
pub fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if !stack.is_empty() => in_string = true,
            '{' => stack.push(i),
            '}' => {
                if let Some(start) = stack.pop() {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans.sort_by(|a, b| b.len().cmp(&a.len()));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_wins() {
        let text = "Here you go:\n```json\n{\"fields\": [{\"name\": \"id\"}]}\n```\nThanks {not json}";
        let rec = recover_json(text).unwrap();
        assert_eq!(rec.stage, RecoveryStage::FencedBlock);
        assert_eq!(rec.value, json!({ "fields": [{ "name": "id" }] }));
    }

    #[test]
    fn test_brace_span_with_trailing_commas() {
        let text = "Result: {\"a\": 1, \"b\": [1, 2,],} done";
        let rec = recover_json(text).unwrap();
        assert_eq!(rec.stage, RecoveryStage::BraceSpan);
        assert_eq!(rec.value, json!({ "a": 1, "b": [1, 2] }));
    }

    #[test]
    fn test_adjacent_objects_become_array() {
        assert_eq!(
            repair("{\"name\": \"a\"} {\"name\": \"b\"}"),
            "[{\"name\": \"a\"},{\"name\": \"b\"}]"
        );
        let rec = recover_json("fields:\n{\"name\": \"a\"}\n{\"name\": \"b\"}").unwrap();
        assert_eq!(rec.value, json!([{ "name": "a" }, { "name": "b" }]));
    }

    #[test]
    fn test_balanced_scan_recovers_inner_object() {
        // The outer span is broken, but one balanced object inside parses.
        let text = "{ broken: {\"name\": \"email\", \"type\": \"string\"} trailing garbage }";
        let rec = recover_json(text).unwrap();
        assert_eq!(rec.stage, RecoveryStage::BalancedScan);
        assert_eq!(rec.value, json!({ "name": "email", "type": "string" }));
    }

    #[test]
    fn test_balanced_spans_ignore_braces_in_strings() {
        let spans = balanced_spans(r#"{"a": "}{"} x {"b": 2}"#);
        assert_eq!(spans, vec![r#"{"a": "}{"}"#, r#"{"b": 2}"#]);
    }

    #[test]
    fn test_no_json_returns_none() {
        assert!(recover_json("CustomerID: unique identifier").is_none());
        assert!(recover_json("").is_none());
    }
}
