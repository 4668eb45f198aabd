//! Error types for the state memory.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::CandidateId;

/// Errors raised by state memory operations.
///
/// Every variant is a caller or producer bug. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum KStateError {
    /// The sample is older than the newest retained sample.
    #[error("out-of-order update: sample at {sample} precedes newest sample at {newest}")]
    OutOfOrder {
        sample: DateTime<Utc>,
        newest: DateTime<Utc>,
    },

    /// A candidate names a predecessor that is not a live member of the previous step.
    #[error("inconsistent batch: candidate #{position} names {predecessor}, which is not in the previous step")]
    InconsistentPredecessor {
        position: usize,
        predecessor: CandidateId,
    },

    /// A timestamp was requested from a memory with no retained steps.
    #[error("state memory is empty")]
    EmptyHistory,

    /// A snapshot violates the structural invariants and cannot be restored.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for state memory operations.
pub type KStateResult<T> = Result<T, KStateError>;
