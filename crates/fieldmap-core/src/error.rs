//! Error kinds shared by the engine.
//!
//! Parser fallback stages recover locally and never produce one of these;
//! every other failure propagates to the caller unmodified.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// Empty or malformed arguments. A caller bug; retrying will not help.
    #[error("invalid input to {operation}: {reason}")]
    InvalidInput {
        operation: &'static str,
        reason: String,
    },

    /// Vector length disagreement between two vectors or against the store.
    #[error("dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Upstream embedding or generation failure.
    #[error("{operation} service error{}: {reason}", status_suffix(.status))]
    Service {
        operation: &'static str,
        status: Option<u16>,
        reason: String,
    },

    /// The operation needs a populated vector store.
    #[error("{operation} requires a populated vector store; load a corpus first")]
    NotInitialized { operation: &'static str },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl MapError {
    pub fn invalid_input(operation: &'static str, reason: impl Into<String>) -> Self {
        MapError::InvalidInput {
            operation,
            reason: reason.into(),
        }
    }

    pub fn service(operation: &'static str, status: Option<u16>, reason: impl Into<String>) -> Self {
        MapError::Service {
            operation,
            status,
            reason: reason.into(),
        }
    }
}
