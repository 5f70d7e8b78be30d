//! Typed error hierarchy for the composite reducer.
//!
//! One enum per collaborator, plus the reducer's own:
//! - `DivisorError` — divisor table configuration failures
//! - `RegistryError` — the registry rejected a merge batch
//! - `SnapshotError` — the snapshot sink failed to record a state
//! - `ReduceError` — what `Reducer::reduce` surfaces to its caller

use std::path::PathBuf;

use thiserror::Error;

use crate::TokenId;
use crate::divisors::Round;

/// Errors from divisor table construction and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DivisorError {
    #[error("Divisor table has no entry for round {round} (table length {len})")]
    OutOfRange { round: Round, len: usize },

    #[error("Divisor table cannot be empty")]
    Empty,

    #[error("Invalid divisor '{value}': {message}")]
    Invalid { value: String, message: String },
}

/// Errors from the registry when a merge batch is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Token {token} does not exist")]
    UnknownToken { token: TokenId },

    #[error("Token {token} has already been burned")]
    AlreadyBurned { token: TokenId },

    #[error("Token {token} appears more than once in the batch")]
    Overlap { token: TokenId },

    #[error("Merge batch has no tokens to keep")]
    EmptyKeep,

    #[error("Actor '{actor}' is not allowed to merge token {token}")]
    Unauthorized { token: TokenId, actor: String },

    #[error("Registry rejected the batch: {0}")]
    Rejected(String),
}

/// Errors from a snapshot sink.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to write snapshot at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Snapshot sink unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a reduction. Collaborator failures pass through unchanged.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Cannot reduce an empty token sequence")]
    EmptyInput,

    #[error(transparent)]
    Divisor(#[from] DivisorError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
