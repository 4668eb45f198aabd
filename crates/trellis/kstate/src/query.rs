//! Read-only queries: current candidates, estimate and backtrace.

use chrono::{DateTime, Utc};
use trellis_types::{CandidateId, KStateError, KStateResult, Sample, StateCandidate};

use crate::memory::{outranks, KState};
use crate::report::KStateStats;
use crate::view::{CandidateRef, StepView};

impl<S, C, T> KState<S, C, T> {
    /// Number of retained steps.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Number of live candidates across all retained steps.
    pub fn candidate_count(&self) -> usize {
        self.refs.len()
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// How many candidates of the next step name `id` as predecessor.
    pub fn references(&self, id: CandidateId) -> Option<usize> {
        self.refs.count(id)
    }

    pub fn get(&self, id: CandidateId) -> Option<CandidateRef<'_, C, T>> {
        self.nodes.get(&id).map(|node| CandidateRef {
            id,
            step: node.step,
            candidate: &node.candidate,
            predecessor: node.predecessor,
            transition: node.transition.as_ref(),
        })
    }

    /// Candidates of the newest step in insertion order, empty when there is none.
    pub fn current_candidates(&self) -> Vec<CandidateRef<'_, C, T>> {
        self.window
            .back()
            .map(|entry| entry.candidates.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Most recent sample, if any.
    pub fn sample(&self) -> Option<&S> {
        self.window.back().map(|entry| &entry.sample)
    }

    /// Retained samples, oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = &S> + '_ {
        self.window.iter().map(|entry| &entry.sample)
    }

    /// Retained steps, oldest to newest.
    pub fn steps(&self) -> impl Iterator<Item = StepView<'_, S>> + '_ {
        self.window.iter().map(|entry| StepView {
            step: entry.step,
            sample: &entry.sample,
            candidates: &entry.candidates,
            map: entry.map,
        })
    }

    /// Identifiers of the most probable path ending at the newest step,
    /// oldest to newest, one per retained step.
    ///
    /// Follows predecessor links back from the newest MAP candidate. Where a
    /// link is missing or leaves the step, the step's own MAP candidate
    /// continues the path.
    pub fn best_sequence_ids(&self) -> Vec<CandidateId> {
        let mut path = Vec::with_capacity(self.window.len());
        let mut cursor: Option<CandidateId> = None;

        for entry in self.window.iter().rev() {
            let id = match cursor {
                Some(id) if self.nodes.get(&id).is_some_and(|n| n.step == entry.step) => id,
                _ => entry.map,
            };
            path.push(id);
            cursor = self.nodes.get(&id).and_then(|node| node.predecessor);
        }

        path.reverse();
        path
    }

    /// The most probable path ending at the newest step, oldest to newest.
    pub fn best_sequence(&self) -> Vec<CandidateRef<'_, C, T>> {
        self.best_sequence_ids()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }
}

impl<S: Sample, C, T> KState<S, C, T> {
    /// Time of the newest sample.
    ///
    /// An empty memory has no time; that is an error, not a default.
    pub fn time(&self) -> KStateResult<DateTime<Utc>> {
        self.sample()
            .map(|sample| sample.time())
            .ok_or(KStateError::EmptyHistory)
    }

    pub fn stats(&self) -> KStateStats {
        KStateStats {
            steps: self.window.len(),
            candidates: self.refs.len(),
            oldest_time: self.window.front().map(|entry| entry.sample.time()),
            newest_time: self.window.back().map(|entry| entry.sample.time()),
            updates_applied: self.updates_applied,
            candidates_collected: self.candidates_collected,
            steps_evicted: self.steps_evicted,
        }
    }
}

impl<S, C: StateCandidate, T> KState<S, C, T> {
    /// Candidate of the newest step with the highest filter probability.
    /// First encountered wins ties.
    pub fn current_estimate(&self) -> Option<CandidateRef<'_, C, T>> {
        let mut best: Option<CandidateRef<'_, C, T>> = None;
        for candidate in self.current_candidates() {
            let replace = match &best {
                None => true,
                Some(current) => outranks(
                    candidate.candidate.filter_probability(),
                    current.candidate.filter_probability(),
                ),
            };
            if replace {
                best = Some(candidate);
            }
        }
        best
    }
}
