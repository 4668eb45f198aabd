//! Borrowed read views over retained state.

use trellis_types::{CandidateId, StepId};

/// A retained candidate together with its lattice edge.
#[derive(Debug)]
pub struct CandidateRef<'a, C, T> {
    pub id: CandidateId,
    /// Step the candidate was inserted at.
    pub step: StepId,
    pub candidate: &'a C,
    /// Cleared once the predecessor's step is evicted.
    pub predecessor: Option<CandidateId>,
    pub transition: Option<&'a T>,
}

impl<C, T> Clone for CandidateRef<'_, C, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, T> Copy for CandidateRef<'_, C, T> {}

/// A retained time step.
#[derive(Debug)]
pub struct StepView<'a, S> {
    pub step: StepId,
    pub sample: &'a S,
    /// Live candidates in insertion order.
    pub candidates: &'a [CandidateId],
    /// MAP candidate chosen when the step was inserted.
    pub map: CandidateId,
}

impl<S> Clone for StepView<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for StepView<'_, S> {}
