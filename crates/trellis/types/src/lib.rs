//! # trellis-types
//!
//! The contract between the Trellis state memory and the components that feed it.
//!
//! A map matcher (or any other online sequence decoder) produces, for every
//! incoming [`Sample`], a batch of weighted [`StateCandidate`]s. Each candidate
//! may name a predecessor from the previous batch. The memory in
//! `trellis-kstate` keeps just enough of that lattice to answer "what is the
//! most probable path so far" while discarding everything that can no longer
//! be part of it.
//!
//! ```text
//!   sample t-2          sample t-1           sample t
//!   ┌────────┐          ┌────────┐          ┌────────┐
//!   │ cand:0 │◄─────────│ cand:3 │◄─────────│ cand:5 │  ← MAP
//!   │ cand:1 │     ┌────│ cand:4 │          │ cand:6 │
//!   │ cand:2 │◄────┘    └────────┘          └────────┘
//!   └────────┘
//! ```
//!
//! This crate holds only the vocabulary: sample and candidate capabilities,
//! identifiers, window configuration and the error type.

#![deny(unsafe_code)]

pub mod candidate;
pub mod config;
pub mod error;
pub mod ids;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use candidate::{NewCandidate, Sample, StateCandidate};
pub use config::KStateConfig;
pub use error::{KStateError, KStateResult};
pub use ids::{CandidateId, StepId, StreamId};
