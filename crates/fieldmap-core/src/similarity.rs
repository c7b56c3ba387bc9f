//! Similarity engine: cosine similarity and brute-force top-K ranking.
//!
//! Ranking is a full linear scan, `O(n × d)` per query. Callers reach it
//! through [`crate::store::VectorIndex`], so an approximate index can
//! replace the scan without touching them.

use std::cmp::Ordering;

use crate::error::{MapError, Result};
use crate::models::VectorRecord;

/// Anything that carries an embedding vector.
pub trait Embedded {
    fn vector(&self) -> &[f32];
}

impl Embedded for VectorRecord {
    fn vector(&self) -> &[f32] {
        &self.vector
    }
}

impl Embedded for Vec<f32> {
    fn vector(&self) -> &[f32] {
        self
    }
}

impl<T: Embedded + ?Sized> Embedded for &T {
    fn vector(&self) -> &[f32] {
        (**self).vector()
    }
}

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// If either vector has zero norm the result is `0.0`, so degenerate
/// embeddings rank as unrelated to everything.
///
/// # Errors
///
/// [`MapError::DimensionMismatch`] if the vectors differ in length.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MapError::DimensionMismatch {
            operation: "similarity",
            expected: a.len(),
            actual: b.len(),
        });
    }

    // f64 accumulation keeps tiny components from underflowing to zero.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let cos = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(cos.clamp(-1.0, 1.0) as f32)
}

/// Rank `candidates` against `query`, keeping the best `k`.
///
/// Results are sorted by descending score. Ties keep the candidates'
/// original order (stable sort). `k == 0` yields an empty vector.
pub fn top_k<T, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<Scored<T>>>
where
    T: Embedded,
    I: IntoIterator<Item = T>,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::new();
    for item in candidates {
        let score = cosine_similarity(query, item.vector())?;
        scored.push(Scored { item, score });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}
