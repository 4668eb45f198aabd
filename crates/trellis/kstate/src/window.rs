//! Sequence window of retained time steps, oldest to newest.

use std::collections::VecDeque;

use trellis_types::{CandidateId, StepId};

/// One retained time step.
///
/// `map` is always a member of `candidates` while the entry exists.
#[derive(Clone, Debug)]
pub(crate) struct StepEntry<S> {
    pub step: StepId,
    pub sample: S,
    /// Live candidates in insertion order.
    pub candidates: Vec<CandidateId>,
    pub map: CandidateId,
}

impl<S> StepEntry<S> {
    pub(crate) fn remove(&mut self, id: CandidateId) -> bool {
        let before = self.candidates.len();
        self.candidates.retain(|c| *c != id);
        self.candidates.len() != before
    }
}

/// Steps carry consecutive ids, so a step is found by offset from the front.
#[derive(Clone, Debug)]
pub(crate) struct StepWindow<S> {
    entries: VecDeque<StepEntry<S>>,
}

impl<S> Default for StepWindow<S> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<S> StepWindow<S> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_back(&mut self, entry: StepEntry<S>) {
        debug_assert!(self
            .entries
            .back()
            .map_or(true, |last| last.step.next() == entry.step));
        self.entries.push_back(entry);
    }

    pub(crate) fn pop_front(&mut self) -> Option<StepEntry<S>> {
        self.entries.pop_front()
    }

    pub(crate) fn front(&self) -> Option<&StepEntry<S>> {
        self.entries.front()
    }

    pub(crate) fn back(&self) -> Option<&StepEntry<S>> {
        self.entries.back()
    }

    fn offset(&self, step: StepId) -> Option<usize> {
        let first = self.entries.front()?.step;
        let offset = usize::try_from(step.0.checked_sub(first.0)?).ok()?;
        (offset < self.entries.len()).then_some(offset)
    }

    pub(crate) fn get(&self, step: StepId) -> Option<&StepEntry<S>> {
        self.offset(step).and_then(|i| self.entries.get(i))
    }

    pub(crate) fn get_mut(&mut self, step: StepId) -> Option<&mut StepEntry<S>> {
        self.offset(step).and_then(move |i| self.entries.get_mut(i))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> std::collections::vec_deque::Iter<'_, StepEntry<S>> {
        self.entries.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
