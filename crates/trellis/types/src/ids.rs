//! Identifier types.
//!
//! Candidates are keyed by an arena identifier handed out by the memory, never
//! by their value. Two candidates with identical scores stay distinct.

use serde::{Deserialize, Serialize};

// ── Candidate Identifier ────────────────────────────────────────────────

/// Stable opaque identifier of a candidate retained by a state memory.
///
/// Identifiers are assigned in increasing order and never reused within one
/// memory, so they double as an insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cand:{}", self.0)
    }
}

// ── Step Identifier ─────────────────────────────────────────────────────

/// Sequence number of a time step. Consecutive updates get consecutive ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u64);

impl StepId {
    /// The step immediately before this one, if any.
    pub fn previous(self) -> Option<StepId> {
        self.0.checked_sub(1).map(StepId)
    }

    /// The step immediately after this one.
    pub fn next(self) -> StepId {
        StepId(self.0 + 1)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step:{}", self.0)
    }
}

// ── Stream Identifier ───────────────────────────────────────────────────

/// Names the observation stream a memory belongs to (one vehicle, one trace).
///
/// Carried in every log event so interleaved streams can be told apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl StreamId {
    /// Generate a new unique stream ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Use a caller-chosen name, e.g. a vehicle identifier.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream:{}", self.0)
    }
}
