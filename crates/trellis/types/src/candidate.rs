//! Sample and candidate capabilities.
//!
//! The memory never computes probabilities. It only reads the two scores a
//! candidate carries and the timestamp of the sample that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CandidateId;

// ── Sample ──────────────────────────────────────────────────────────────

/// An observation with a timestamp. Opaque otherwise.
pub trait Sample {
    /// When the observation was taken.
    fn time(&self) -> DateTime<Utc>;
}

impl Sample for DateTime<Utc> {
    fn time(&self) -> DateTime<Utc> {
        *self
    }
}

// ── State Candidate ─────────────────────────────────────────────────────

/// A node of the state lattice for one time step.
pub trait StateCandidate {
    /// Cumulative probability of the best path ending in this candidate.
    /// Higher is more probable. Picks the step's MAP candidate.
    fn sequence_probability(&self) -> f64;

    /// Instantaneous probability of this state given all observations so far.
    /// Higher is more probable. Picks the current estimate.
    fn filter_probability(&self) -> f64;
}

// ── New Candidate ───────────────────────────────────────────────────────

/// A candidate handed to the memory together with its lattice edge.
///
/// `predecessor` must name a candidate of the previous update, `transition`
/// is whatever the producer wants to keep about that edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCandidate<C, T = ()> {
    /// The candidate value. Ownership moves into the memory.
    pub candidate: C,
    /// Candidate of the previous step this one extends, `None` for a root.
    pub predecessor: Option<CandidateId>,
    /// Opaque edge metadata between predecessor and candidate.
    pub transition: Option<T>,
}

impl<C, T> NewCandidate<C, T> {
    /// A start state with no predecessor.
    pub fn root(candidate: C) -> Self {
        Self {
            candidate,
            predecessor: None,
            transition: None,
        }
    }

    /// A candidate extending `predecessor`.
    pub fn following(candidate: C, predecessor: CandidateId) -> Self {
        Self {
            candidate,
            predecessor: Some(predecessor),
            transition: None,
        }
    }

    /// Attach edge metadata.
    pub fn with_transition(mut self, transition: T) -> Self {
        self.transition = Some(transition);
        self
    }
}
