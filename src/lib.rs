//! # fieldmap
//!
//! Semantic field mapping between heterogeneous data structure
//! descriptions.
//!
//! fieldmap reads JSON schemas, sample JSON, and free-text documents,
//! extracts a normalized list of fields from each, embeds the fields and
//! whole documents with an external embedding model, and ranks
//! field-to-field correspondences by cosine similarity. The same vectors
//! back retrieval of prior documents and fields for a free-text query.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Loader   │──▶│   Parser    │──▶│    Mapper    │
//! │ walk+hash  │   │ JSON / LLM  │   │ embed + rank │
//! └────────────┘   │ / heuristic │   └──────┬───────┘
//!                  └─────────────┘          │
//!                        ┌──────────────────┤
//!                        ▼                  ▼
//!                 ┌─────────────┐    ┌─────────────┐
//!                 │ VectorIndex │    │   Corpus    │
//!                 │ (in memory) │    │   (JSON)    │
//!                 └─────────────┘    └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fmap load ./schemas                    # parse + embed a directory
//! fmap analyze ./schemas/customer.md     # show extracted fields
//! fmap map ./a.json ./b.json             # propose field mappings
//! fmap query "customer contact email"    # retrieve related fields
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding service contract and batching |
//! | [`generation`] | Generation service contract |
//! | [`parser`] | Raw content → structure |
//! | [`mapper`] | Embedding, mapping and knowledge retrieval |
//! | [`corpus`] | Persisted embedded structures |
//! | [`loader`] | Directory walking and incremental loads |
//!
//! Pure logic (data model, similarity, vector store, walkers, heuristic
//! extraction, JSON recovery) lives in [`fieldmap_core`].

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod generation;
mod http;
pub mod loader;
pub mod mapper;
pub mod parser;

pub use fieldmap_core::{MapError, Result};
