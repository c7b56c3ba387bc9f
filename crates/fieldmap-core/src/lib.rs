//! # fieldmap core
//!
//! Shared, synchronous logic for fieldmap: the structure data model, the
//! heuristic field extractor, JSON payload recovery, schema walkers, the
//! similarity engine and the append-only vector store.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Everything
//! that talks to the embedding or generation services lives in the
//! `fieldmap` application crate.

pub mod error;
pub mod extract;
pub mod models;
pub mod recover;
pub mod similarity;
pub mod store;
pub mod walker;

pub use error::{MapError, Result};
