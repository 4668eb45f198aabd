//! The bounded state memory and its update pipeline.
//!
//! An update runs four phases:
//!
//! 1. validate the batch and register its candidates (predecessor counts up)
//! 2. prune the previous step's now-unreferenced candidates, cascading backward
//! 3. append the batch as the newest step
//! 4. evict the oldest steps while a window bound is exceeded
//!
//! Validation happens before any bookkeeping changes, so a rejected update
//! leaves the memory exactly as it was.

use std::collections::HashMap;

use tracing::{debug, warn};
use trellis_types::{
    CandidateId, KStateConfig, KStateError, KStateResult, NewCandidate, Sample, StateCandidate,
    StepId, StreamId,
};

use crate::refs::ReferenceTable;
use crate::report::UpdateReport;
use crate::window::{StepEntry, StepWindow};

/// Arena slot of a retained candidate.
#[derive(Clone, Debug)]
pub(crate) struct Node<C, T> {
    pub candidate: C,
    pub predecessor: Option<CandidateId>,
    pub transition: Option<T>,
    pub step: StepId,
}

/// Bounded memory for online Viterbi decoding ("k-state").
///
/// Owns the candidates of every retained step in an arena keyed by
/// [`CandidateId`]. Predecessor links are ids into that arena, so clearing one
/// is an assignment and nothing can dangle.
///
/// Single writer: `update` takes `&mut self`. Callers sharing a memory across
/// threads wrap it in a lock; queries only need `&self`.
#[derive(Clone, Debug)]
pub struct KState<S, C, T = ()> {
    pub(crate) stream: StreamId,
    pub(crate) config: KStateConfig,
    pub(crate) window: StepWindow<S>,
    pub(crate) nodes: HashMap<CandidateId, Node<C, T>>,
    pub(crate) refs: ReferenceTable,
    pub(crate) next_id: u64,
    pub(crate) next_step: u64,
    pub(crate) updates_applied: u64,
    pub(crate) candidates_collected: u64,
    pub(crate) steps_evicted: u64,
}

impl<S, C, T> KState<S, C, T> {
    pub fn new(config: KStateConfig) -> Self {
        Self {
            stream: StreamId::new(),
            config,
            window: StepWindow::new(),
            nodes: HashMap::new(),
            refs: ReferenceTable::new(),
            next_id: 0,
            next_step: 0,
            updates_applied: 0,
            candidates_collected: 0,
            steps_evicted: 0,
        }
    }

    /// A memory with neither a size nor a duration bound.
    pub fn unbounded() -> Self {
        Self::new(KStateConfig::unbounded())
    }

    /// Name the stream this memory decodes (used in log events).
    pub fn with_stream(mut self, stream: StreamId) -> Self {
        self.stream = stream;
        self
    }

    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    pub fn config(&self) -> &KStateConfig {
        &self.config
    }

    /// Drop every step and all bookkeeping. Identifiers are not reused.
    pub fn clear(&mut self) {
        self.window.clear();
        self.nodes.clear();
        self.refs.clear();
        debug!(stream = %self.stream, "State memory cleared");
    }
}

impl<S: Sample, C: StateCandidate, T> KState<S, C, T> {
    /// Incorporate a new batch of candidates as the newest step.
    ///
    /// An empty batch is a no-op. The batch itself is never pruned by this
    /// call; only older steps are.
    pub fn update(
        &mut self,
        sample: S,
        batch: Vec<NewCandidate<C, T>>,
    ) -> KStateResult<UpdateReport> {
        if batch.is_empty() {
            return Ok(UpdateReport::unchanged());
        }

        let time = sample.time();
        if let Some(newest) = self.window.back() {
            let newest_time = newest.sample.time();
            if time < newest_time {
                warn!(
                    stream = %self.stream,
                    sample = %time,
                    newest = %newest_time,
                    "Rejected out-of-order update"
                );
                return Err(KStateError::OutOfOrder {
                    sample: time,
                    newest: newest_time,
                });
            }
        }
        self.validate(&batch)?;

        let previous = self.window.back().map(|entry| entry.step);
        let step = StepId(self.next_step);
        let map_position = map_position(&batch);

        let mut assigned = Vec::with_capacity(batch.len());
        for new in batch {
            let id = CandidateId(self.next_id);
            self.next_id += 1;

            self.refs.register(id);
            if let Some(predecessor) = new.predecessor {
                self.refs.increment(predecessor);
            }
            self.nodes.insert(
                id,
                Node {
                    candidate: new.candidate,
                    predecessor: new.predecessor,
                    transition: new.transition,
                    step,
                },
            );
            assigned.push(id);
        }
        let map = assigned[map_position];

        let collected = match previous {
            Some(previous) => self.prune(previous),
            None => 0,
        };

        self.window.push_back(StepEntry {
            step,
            sample,
            candidates: assigned.clone(),
            map,
        });
        self.next_step += 1;

        let evicted = self.evict();
        self.updates_applied += 1;

        debug!(
            stream = %self.stream,
            step = %step,
            candidates = assigned.len(),
            map = %map,
            collected,
            evicted,
            "Applied update"
        );

        Ok(UpdateReport {
            step: Some(step),
            assigned,
            map: Some(map),
            collected,
            evicted,
        })
    }

    /// Every named predecessor must be tracked and belong to the newest step.
    fn validate(&self, batch: &[NewCandidate<C, T>]) -> KStateResult<()> {
        let newest = self.window.back().map(|entry| entry.step);

        for (position, new) in batch.iter().enumerate() {
            let Some(predecessor) = new.predecessor else {
                continue;
            };
            let consistent = self.refs.contains(predecessor)
                && self
                    .nodes
                    .get(&predecessor)
                    .is_some_and(|node| Some(node.step) == newest);
            if !consistent {
                warn!(
                    stream = %self.stream,
                    position,
                    predecessor = %predecessor,
                    "Rejected update with inconsistent predecessor"
                );
                return Err(KStateError::InconsistentPredecessor {
                    position,
                    predecessor,
                });
            }
        }
        Ok(())
    }

    /// Collect the previous step's unreferenced candidates.
    ///
    /// When every candidate of that step is unreferenced its MAP candidate
    /// survives, so a retained step is never empty.
    fn prune(&mut self, previous: StepId) -> usize {
        let Some(entry) = self.window.get(previous) else {
            return 0;
        };
        let unreferenced: Vec<CandidateId> = entry
            .candidates
            .iter()
            .copied()
            .filter(|id| self.refs.count(*id) == Some(0))
            .collect();
        let everything = unreferenced.len() == entry.candidates.len();
        let map = entry.map;

        let mut collected = 0;
        for id in unreferenced {
            if !everything || id != map {
                collected += self.collect(previous, id);
            }
        }
        collected
    }

    /// Remove `id` from `step`, then walk backward while predecessors drop to
    /// zero references. MAP candidates stop the walk.
    pub(crate) fn collect(&mut self, step: StepId, id: CandidateId) -> usize {
        let mut collected = 0;
        let mut worklist = vec![(step, id)];

        while let Some((step, id)) = worklist.pop() {
            let Some(entry) = self.window.get_mut(step) else {
                continue;
            };
            if entry.map == id || !entry.remove(id) {
                continue;
            }
            self.refs.remove(id);
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            collected += 1;
            debug!(stream = %self.stream, step = %step, candidate = %id, "Collected candidate");

            let Some(predecessor) = node.predecessor else {
                continue;
            };
            if self.refs.decrement(predecessor) == Some(0) {
                if let Some(pred_step) = self.nodes.get(&predecessor).map(|n| n.step) {
                    worklist.push((pred_step, predecessor));
                }
            }
        }

        self.candidates_collected += collected as u64;
        collected
    }

    /// Drop oldest steps until both window bounds hold.
    fn evict(&mut self) -> usize {
        let mut evicted = 0;

        while self.exceeds_bounds() {
            let Some(oldest) = self.window.pop_front() else {
                break;
            };
            for id in &oldest.candidates {
                self.refs.remove(*id);
                self.nodes.remove(id);
            }
            // The new oldest step becomes a root generation.
            if let Some(front) = self.window.front() {
                for id in &front.candidates {
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.predecessor = None;
                    }
                }
            }
            debug!(
                stream = %self.stream,
                step = %oldest.step,
                candidates = oldest.candidates.len(),
                "Evicted step"
            );
            evicted += 1;
        }

        self.steps_evicted += evicted as u64;
        evicted
    }

    fn exceeds_bounds(&self) -> bool {
        let (Some(oldest), Some(newest)) = (self.window.front(), self.window.back()) else {
            return false;
        };
        self.config.exceeds_size(self.window.len())
            || self
                .config
                .exceeds_span(oldest.sample.time(), newest.sample.time())
    }
}

/// `candidate` ranks above `best`. NaN ranks below every number.
pub(crate) fn outranks(candidate: f64, best: f64) -> bool {
    candidate > best || (best.is_nan() && !candidate.is_nan())
}

/// Position of the highest sequence probability in a non-empty batch; first wins ties.
fn map_position<C: StateCandidate, T>(batch: &[NewCandidate<C, T>]) -> usize {
    let mut best = 0;
    let mut best_probability = f64::NAN;
    for (position, new) in batch.iter().enumerate() {
        let probability = new.candidate.sequence_probability();
        if position == 0 || outranks(probability, best_probability) {
            best = position;
            best_probability = probability;
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) struct Cand {
        pub label: &'static str,
        pub seq: f64,
        pub filter: f64,
    }

    impl StateCandidate for Cand {
        fn sequence_probability(&self) -> f64 {
            self.seq
        }
        fn filter_probability(&self) -> f64 {
            self.filter
        }
    }

    pub(crate) fn cand(label: &'static str, seq: f64) -> Cand {
        Cand {
            label,
            seq,
            filter: seq,
        }
    }

    pub(crate) fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub(crate) fn root(label: &'static str, seq: f64) -> NewCandidate<Cand> {
        NewCandidate::root(cand(label, seq))
    }

    pub(crate) fn follow(label: &'static str, seq: f64, pred: CandidateId) -> NewCandidate<Cand> {
        NewCandidate::following(cand(label, seq), pred)
    }

    fn step_labels(state: &KState<DateTime<Utc>, Cand>, step: StepId) -> Vec<&'static str> {
        state
            .window
            .get(step)
            .map(|e| e.candidates.iter().map(|id| state.nodes[id].candidate.label).collect())
            .unwrap_or_default()
    }

    #[test]
    fn first_update_creates_root_step() {
        let mut state = KState::unbounded();
        let report = state
            .update(at(0), vec![root("a", 0.2), root("b", 0.7), root("c", 0.1)])
            .unwrap();

        assert_eq!(report.step, Some(StepId(0)));
        assert_eq!(report.assigned.len(), 3);
        assert_eq!(report.map, Some(report.assigned[1]));
        assert_eq!(report.collected, 0);
        assert_eq!(report.evicted, 0);
        assert_eq!(state.window.len(), 1);
        assert_eq!(state.refs.len(), 3);
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut state: KState<DateTime<Utc>, Cand> = KState::unbounded();
        state.update(at(0), vec![root("a", 0.5)]).unwrap();

        let report = state.update(at(5), Vec::new()).unwrap();
        assert!(report.is_noop());
        assert_eq!(state.window.len(), 1);
        assert_eq!(state.updates_applied, 1);
    }

    #[test]
    fn map_ties_pick_first_encountered() {
        let mut state = KState::unbounded();
        let report = state
            .update(at(0), vec![root("a", 0.4), root("b", 0.4), root("c", 0.1)])
            .unwrap();
        assert_eq!(report.map, Some(report.assigned[0]));
    }

    #[test]
    fn nan_sequence_probability_never_wins_map() {
        let mut state = KState::unbounded();
        let report = state
            .update(at(0), vec![root("nan", f64::NAN), root("b", 0.1)])
            .unwrap();
        assert_eq!(report.map, Some(report.assigned[1]));
    }

    #[test]
    fn out_of_order_update_is_rejected_without_mutation() {
        let mut state = KState::unbounded();
        let first = state.update(at(10), vec![root("a", 0.5)]).unwrap();

        let err = state
            .update(at(9), vec![follow("b", 0.5, first.assigned[0])])
            .unwrap_err();
        assert!(matches!(err, KStateError::OutOfOrder { .. }));
        assert_eq!(state.window.len(), 1);
        assert_eq!(state.refs.count(first.assigned[0]), Some(0));
        assert_eq!(state.next_id, 1);
    }

    #[test]
    fn equal_timestamps_are_accepted() {
        let mut state = KState::unbounded();
        let first = state.update(at(10), vec![root("a", 0.5)]).unwrap();
        let second = state.update(at(10), vec![follow("b", 0.5, first.assigned[0])]);
        assert!(second.is_ok());
        assert_eq!(state.window.len(), 2);
    }

    #[test]
    fn unknown_predecessor_is_rejected_without_mutation() {
        let mut state = KState::unbounded();
        let first = state.update(at(0), vec![root("a", 0.5)]).unwrap();

        let err = state
            .update(
                at(1),
                vec![follow("b", 0.9, first.assigned[0]), follow("c", 0.1, CandidateId(99))],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            KStateError::InconsistentPredecessor {
                position: 1,
                predecessor: CandidateId(99)
            }
        ));
        // The valid first candidate must not have bumped the count.
        assert_eq!(state.refs.count(first.assigned[0]), Some(0));
        assert_eq!(state.window.len(), 1);
        assert_eq!(state.nodes.len(), 1);
    }

    #[test]
    fn predecessor_from_older_step_is_rejected() {
        let mut state = KState::unbounded();
        let s0 = state.update(at(0), vec![root("a", 0.5)]).unwrap();
        let s1 = state
            .update(at(1), vec![follow("b", 0.5, s0.assigned[0])])
            .unwrap();
        assert_eq!(s1.collected, 0);

        let err = state
            .update(at(2), vec![follow("c", 0.5, s0.assigned[0])])
            .unwrap_err();
        assert!(matches!(err, KStateError::InconsistentPredecessor { position: 0, .. }));
        assert_eq!(state.window.len(), 2);
    }

    #[test]
    fn predecessor_on_first_update_is_rejected() {
        let mut state: KState<DateTime<Utc>, Cand> = KState::unbounded();
        let err = state
            .update(at(0), vec![follow("a", 0.5, CandidateId(0))])
            .unwrap_err();
        assert!(matches!(err, KStateError::InconsistentPredecessor { .. }));
        assert!(state.window.is_empty());
    }

    #[test]
    fn unreferenced_lineage_is_collected_in_cascade() {
        let mut state = KState::unbounded();
        let s0 = state
            .update(at(0), vec![root("a0", 0.9), root("a1", 0.1)])
            .unwrap();
        let s1 = state
            .update(
                at(1),
                vec![
                    follow("b0", 0.8, s0.assigned[0]),
                    follow("b1", 0.2, s0.assigned[1]),
                ],
            )
            .unwrap();
        assert_eq!(s1.collected, 0);

        let s2 = state
            .update(at(2), vec![follow("c0", 0.7, s1.assigned[0])])
            .unwrap();

        assert_eq!(s2.collected, 2);
        assert_eq!(step_labels(&state, StepId(0)), vec!["a0"]);
        assert_eq!(step_labels(&state, StepId(1)), vec!["b0"]);
        assert_eq!(state.refs.len(), 3);
        assert!(!state.refs.contains(s0.assigned[1]));
        assert_eq!(state.candidates_collected, 2);
    }

    #[test]
    fn map_candidate_is_never_collected() {
        let mut state = KState::unbounded();
        let s0 = state
            .update(at(0), vec![root("a0", 0.9), root("a1", 0.1)])
            .unwrap();
        // Only the low-probability candidate is extended.
        let s1 = state
            .update(at(1), vec![follow("b0", 0.3, s0.assigned[1])])
            .unwrap();

        assert_eq!(s1.collected, 0);
        assert_eq!(step_labels(&state, StepId(0)), vec!["a0", "a1"]);
    }

    #[test]
    fn fully_unreferenced_step_keeps_only_its_map() {
        let mut state = KState::unbounded();
        state
            .update(at(0), vec![root("a0", 0.9), root("a1", 0.1), root("a2", 0.5)])
            .unwrap();
        let s1 = state.update(at(1), vec![root("b0", 0.4)]).unwrap();

        assert_eq!(s1.collected, 2);
        assert_eq!(step_labels(&state, StepId(0)), vec!["a0"]);
    }

    #[test]
    fn cascade_stops_at_map_candidate() {
        let mut state = KState::unbounded();
        let s0 = state
            .update(at(0), vec![root("a0", 0.9), root("a1", 0.1)])
            .unwrap();
        let s1 = state
            .update(
                at(1),
                vec![
                    follow("b0", 0.2, s0.assigned[1]),
                    follow("b1", 0.8, s0.assigned[0]),
                ],
            )
            .unwrap();
        // Extend b0 only: b1 (MAP of step 1) is unreferenced but protected,
        // so a0 keeps its reference.
        let s2 = state
            .update(at(2), vec![follow("c0", 0.5, s1.assigned[0])])
            .unwrap();

        assert_eq!(s2.collected, 0);
        assert_eq!(step_labels(&state, StepId(1)), vec!["b0", "b1"]);
        assert_eq!(state.refs.count(s0.assigned[0]), Some(1));
    }

    #[test]
    fn collect_walks_long_chains_iteratively() {
        let mut state = KState::unbounded();
        let mut keep = state.update(at(0), vec![root("k", 0.9)]).unwrap().assigned[0];
        let mut drop = None;
        for t in 1..2_000 {
            let mut batch = vec![follow("k", 0.9, keep)];
            batch.push(match drop {
                Some(d) => follow("d", 0.1, d),
                None => root("d", 0.1),
            });
            let report = state.update(at(t), batch).unwrap();
            keep = report.assigned[0];
            drop = Some(report.assigned[1]);
        }
        let before = state.nodes.len();
        let report = state.update(at(2_000), vec![follow("k", 0.9, keep)]).unwrap();
        assert_eq!(report.collected, 1_999);
        assert_eq!(state.nodes.len(), before + 1 - 1_999);
    }

    #[test]
    fn size_bound_evicts_oldest_steps() {
        let mut state = KState::new(KStateConfig::unbounded().with_size_bound(1));
        let mut pred = None;
        for t in 0..4 {
            let batch = match pred {
                Some(p) => vec![follow("x", 0.5, p)],
                None => vec![root("x", 0.5)],
            };
            let report = state.update(at(t), batch).unwrap();
            pred = Some(report.assigned[0]);
            assert!(state.window.len() <= 2);
        }
        assert_eq!(state.window.len(), 2);
        assert_eq!(state.steps_evicted, 2);
        assert_eq!(state.refs.len(), 2);
    }

    #[test]
    fn duration_bound_evicts_stale_steps() {
        let config = KStateConfig::unbounded().with_duration_bound(Duration::from_secs(10));
        let mut state = KState::new(config);
        let s0 = state.update(at(0), vec![root("a", 0.5)]).unwrap();
        let s1 = state
            .update(at(5), vec![follow("b", 0.5, s0.assigned[0])])
            .unwrap();
        assert_eq!(s1.evicted, 0);

        let s2 = state
            .update(at(12), vec![follow("c", 0.5, s1.assigned[0])])
            .unwrap();
        assert_eq!(s2.evicted, 1);
        assert_eq!(state.window.front().map(|e| e.step), Some(StepId(1)));
    }

    #[test]
    fn eviction_clears_links_into_evicted_step() {
        let mut state = KState::new(KStateConfig::unbounded().with_size_bound(1));
        let s0 = state.update(at(0), vec![root("a", 0.5)]).unwrap();
        let s1 = state
            .update(at(1), vec![follow("b", 0.5, s0.assigned[0])])
            .unwrap();
        state
            .update(at(2), vec![follow("c", 0.5, s1.assigned[0])])
            .unwrap();

        assert!(!state.nodes.contains_key(&s0.assigned[0]));
        assert_eq!(state.nodes[&s1.assigned[0]].predecessor, None);
    }

    #[test]
    fn large_gap_evicts_everything_but_newest() {
        let config = KStateConfig::unbounded().with_duration_bound(Duration::from_secs(1));
        let mut state = KState::new(config);
        let s0 = state.update(at(0), vec![root("a", 0.5)]).unwrap();
        let s1 = state
            .update(at(1), vec![follow("b", 0.5, s0.assigned[0])])
            .unwrap();
        let s2 = state
            .update(at(100), vec![follow("c", 0.5, s1.assigned[0])])
            .unwrap();

        assert_eq!(s2.evicted, 2);
        assert_eq!(state.window.len(), 1);
        assert_eq!(state.nodes[&s2.assigned[0]].predecessor, None);
    }

    #[test]
    fn clear_drops_everything_but_keeps_counters() {
        let mut state = KState::unbounded();
        state.update(at(0), vec![root("a", 0.5)]).unwrap();
        state.clear();

        assert!(state.window.is_empty());
        assert_eq!(state.refs.len(), 0);
        assert!(state.nodes.is_empty());
        assert_eq!(state.updates_applied, 1);

        // A fresh root stream may restart at an earlier time after clearing.
        let report = state.update(at(-5), vec![root("b", 0.5)]).unwrap();
        assert_eq!(report.assigned, vec![CandidateId(1)]);
    }

    #[test]
    fn transitions_are_stored_untouched() {
        let mut state: KState<DateTime<Utc>, Cand, &'static str> = KState::unbounded();
        let s0 = state
            .update(at(0), vec![NewCandidate::root(cand("a", 0.5))])
            .unwrap();
        let s1 = state
            .update(
                at(1),
                vec![NewCandidate::following(cand("b", 0.5), s0.assigned[0]).with_transition("route-7")],
            )
            .unwrap();
        assert_eq!(state.nodes[&s1.assigned[0]].transition, Some("route-7"));
    }

    #[test]
    fn outranks_orders_nan_last() {
        assert!(outranks(0.2, 0.1));
        assert!(!outranks(0.1, 0.1));
        assert!(outranks(0.0, f64::NAN));
        assert!(!outranks(f64::NAN, 0.0));
        assert!(!outranks(f64::NAN, f64::NAN));
    }
}
