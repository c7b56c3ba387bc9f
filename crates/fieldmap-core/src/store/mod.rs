//! Storage abstraction for embedded records.
//!
//! The [`VectorIndex`] trait is the only way the mapper reaches stored
//! vectors, so the brute-force [`memory::InMemoryVectorStore`] can be
//! swapped for an approximate index without touching callers.
//!
//! Stores are append-only and single-writer: insertion takes `&mut self`.
//! Concurrent mappers sharing one store must wrap it in their own lock.

pub mod memory;

use crate::error::Result;
use crate::models::{RecordKind, VectorRecord};

pub use memory::InMemoryVectorStore;

/// Metadata predicate applied before ranking.
///
/// Filtering happens before the top-K cut, so `k` always counts
/// post-filter results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Only records of this kind.
    pub kind: Option<RecordKind>,
    /// Only records whose `source_path` equals this.
    pub source_path: Option<String>,
}

impl RecordFilter {
    pub fn kind(kind: RecordKind) -> Self {
        Self {
            kind: Some(kind),
            source_path: None,
        }
    }

    pub fn fields_of(source_path: &str) -> Self {
        Self {
            kind: Some(RecordKind::Field),
            source_path: Some(source_path.to_string()),
        }
    }

    pub fn matches(&self, record: &VectorRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(path) = &self.source_path {
            if &record.source_path != path {
                return false;
            }
        }
        true
    }
}

/// A ranked record returned from [`VectorIndex::query`].
///
/// Carries the record's metadata but not its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHit {
    pub kind: RecordKind,
    pub field_name: Option<String>,
    pub source_filename: String,
    pub source_path: String,
    /// Raw cosine similarity to the query.
    pub score: f32,
}

/// Append-only collection of vectors with nearest-neighbour queries.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](VectorIndex::insert) | Append one record |
/// | [`query`](VectorIndex::query) | Filter, then rank by cosine similarity |
/// | [`len`](VectorIndex::len) | Number of stored records |
/// | [`dims`](VectorIndex::dims) | Dimensionality fixed by the first insert |
pub trait VectorIndex {
    /// Append a record.
    ///
    /// Fails with `DimensionMismatch` if its vector length differs from
    /// the dimensionality established by the first insertion.
    fn insert(&mut self, record: VectorRecord) -> Result<()>;

    /// Return the `k` records most similar to `query_vec` among those
    /// accepted by `filter`, best first.
    fn query(&self, query_vec: &[f32], filter: &RecordFilter, k: usize) -> Result<Vec<RecordHit>>;

    fn len(&self) -> usize;

    fn dims(&self) -> Option<usize>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
