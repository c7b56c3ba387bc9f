//! In-memory [`VectorIndex`] implementation.
//!
//! Records live in a plain `Vec` in insertion order. Queries are a
//! brute-force cosine scan over the filtered records.

use tracing::debug;

use crate::error::{MapError, Result};
use crate::models::VectorRecord;
use crate::similarity::top_k;

use super::{RecordFilter, RecordHit, VectorIndex};

/// In-memory append-only vector store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVectorStore {
    records: Vec<VectorRecord>,
    dims: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for InMemoryVectorStore {
    fn insert(&mut self, record: VectorRecord) -> Result<()> {
        let actual = record.vector.len();
        match self.dims {
            Some(expected) if expected != actual => {
                return Err(MapError::DimensionMismatch {
                    operation: "insert",
                    expected,
                    actual,
                });
            }
            Some(_) => {}
            None => {
                if actual == 0 {
                    return Err(MapError::invalid_input(
                        "insert",
                        format!(
                            "empty vector for {}",
                            record.field_name.as_deref().unwrap_or(&record.source_path)
                        ),
                    ));
                }
                debug!(dims = actual, "vector store dimensionality fixed");
                self.dims = Some(actual);
            }
        }
        self.records.push(record);
        Ok(())
    }

    fn query(&self, query_vec: &[f32], filter: &RecordFilter, k: usize) -> Result<Vec<RecordHit>> {
        if let Some(expected) = self.dims {
            if expected != query_vec.len() {
                return Err(MapError::DimensionMismatch {
                    operation: "query",
                    expected,
                    actual: query_vec.len(),
                });
            }
        }

        let candidates = self.records.iter().filter(|r| filter.matches(r));
        let ranked = top_k(query_vec, candidates, k)?;

        Ok(ranked
            .into_iter()
            .map(|scored| RecordHit {
                kind: scored.item.kind,
                field_name: scored.item.field_name.clone(),
                source_filename: scored.item.source_filename.clone(),
                source_path: scored.item.source_path.clone(),
                score: scored.score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;

    fn populated() -> InMemoryVectorStore {
        let mut store = InMemoryVectorStore::new();
        store
            .insert(VectorRecord::document(vec![1.0, 0.0, 0.0], "a.json", "/a.json"))
            .unwrap();
        store
            .insert(VectorRecord::field(vec![1.0, 0.1, 0.0], "id", "a.json", "/a.json"))
            .unwrap();
        store
            .insert(VectorRecord::field(vec![0.0, 1.0, 0.0], "name", "a.json", "/a.json"))
            .unwrap();
        store
            .insert(VectorRecord::field(vec![0.9, 0.0, 0.1], "key", "b.json", "/b.json"))
            .unwrap();
        store
    }

    #[test]
    fn test_insert_tracks_dims_lazily() {
        let mut store = InMemoryVectorStore::new();
        assert_eq!(store.dims(), None);
        assert!(store.is_empty());
        store
            .insert(VectorRecord::document(vec![1.0, 2.0], "a", "/a"))
            .unwrap();
        assert_eq!(store.dims(), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_rejects_dimension_mismatch() {
        let mut store = populated();
        let err = store
            .insert(VectorRecord::field(vec![1.0, 0.0], "bad", "c", "/c"))
            .unwrap_err();
        assert_eq!(
            err,
            MapError::DimensionMismatch {
                operation: "insert",
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_query_respects_kind_filter() {
        let store = populated();
        let hits = store
            .query(&[1.0, 0.0, 0.0], &RecordFilter::kind(RecordKind::Field), 10)
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.kind == RecordKind::Field));

        let docs = store
            .query(&[1.0, 0.0, 0.0], &RecordFilter::kind(RecordKind::Document), 10)
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].field_name.is_none());
    }

    #[test]
    fn test_query_filters_before_truncating() {
        let store = populated();
        // The document record is the best match overall, but k counts
        // only records that pass the filter.
        let hits = store
            .query(&[1.0, 0.0, 0.0], &RecordFilter::fields_of("/a.json"), 1)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field_name.as_deref(), Some("id"));
    }

    #[test]
    fn test_query_without_filter_ranks_everything() {
        let store = populated();
        let hits = store
            .query(&[0.0, 1.0, 0.0], &RecordFilter::default(), 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].field_name.as_deref(), Some("name"));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = populated();
        let err = store
            .query(&[1.0, 0.0], &RecordFilter::default(), 2)
            .unwrap_err();
        assert!(matches!(err, MapError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_query_empty_store_is_empty() {
        let store = InMemoryVectorStore::new();
        let hits = store
            .query(&[1.0, 0.0], &RecordFilter::default(), 5)
            .unwrap();
        assert!(hits.is_empty());
    }
}
