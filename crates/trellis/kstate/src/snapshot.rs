//! Point-in-time copies of a state memory.
//!
//! A snapshot is a plain value (serde-serializable when the sample, candidate
//! and transition types are). Where it is kept is up to the caller.
//! `restore` re-checks every structural invariant before rebuilding a memory.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;
use trellis_types::{
    CandidateId, KStateConfig, KStateError, KStateResult, Sample, StepId, StreamId,
};

use crate::memory::{KState, Node};
use crate::refs::ReferenceTable;
use crate::window::{StepEntry, StepWindow};

/// Full state of a memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KStateSnapshot<S, C, T = ()> {
    pub stream: StreamId,
    pub config: KStateConfig,
    /// Next candidate identifier to hand out.
    pub next_id: u64,
    /// Next step identifier to hand out.
    pub next_step: u64,
    /// Retained steps, oldest to newest.
    pub steps: Vec<StepSnapshot<S, C, T>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepSnapshot<S, C, T = ()> {
    pub step: StepId,
    pub sample: S,
    pub map: CandidateId,
    /// In insertion order.
    pub candidates: Vec<CandidateSnapshot<C, T>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CandidateSnapshot<C, T = ()> {
    pub id: CandidateId,
    pub candidate: C,
    pub predecessor: Option<CandidateId>,
    pub transition: Option<T>,
    pub references: usize,
}

fn invalid(reason: impl Into<String>) -> KStateError {
    KStateError::InvalidSnapshot(reason.into())
}

impl<S: Clone, C: Clone, T: Clone> KState<S, C, T> {
    /// Copy out the full retained state.
    pub fn snapshot(&self) -> KStateSnapshot<S, C, T> {
        let steps = self
            .window
            .iter()
            .map(|entry| StepSnapshot {
                step: entry.step,
                sample: entry.sample.clone(),
                map: entry.map,
                candidates: entry
                    .candidates
                    .iter()
                    .filter_map(|id| {
                        let node = self.nodes.get(id)?;
                        Some(CandidateSnapshot {
                            id: *id,
                            candidate: node.candidate.clone(),
                            predecessor: node.predecessor,
                            transition: node.transition.clone(),
                            references: self.refs.count(*id).unwrap_or(0),
                        })
                    })
                    .collect(),
            })
            .collect();

        KStateSnapshot {
            stream: self.stream.clone(),
            config: self.config.clone(),
            next_id: self.next_id,
            next_step: self.next_step,
            steps,
        }
    }
}

impl<S: Sample, C, T> KState<S, C, T> {
    /// Rebuild a memory from a snapshot.
    ///
    /// Refuses snapshots whose steps are out of time order, whose links skip
    /// steps, whose reference counts disagree with the links, or whose window
    /// violates its own bounds. Activity counters start from zero.
    pub fn restore(snapshot: KStateSnapshot<S, C, T>) -> KStateResult<Self> {
        validate(&snapshot)?;

        let KStateSnapshot {
            stream,
            config,
            next_id,
            next_step,
            steps,
        } = snapshot;

        let mut state: Self = KState::new(config).with_stream(stream);
        state.next_id = next_id;
        state.next_step = next_step;

        let mut window = StepWindow::new();
        let mut refs = ReferenceTable::new();
        let mut nodes = HashMap::new();
        for step in steps {
            let mut ids = Vec::with_capacity(step.candidates.len());
            for c in step.candidates {
                refs.register_with(c.id, c.references);
                nodes.insert(
                    c.id,
                    Node {
                        candidate: c.candidate,
                        predecessor: c.predecessor,
                        transition: c.transition,
                        step: step.step,
                    },
                );
                ids.push(c.id);
            }
            window.push_back(StepEntry {
                step: step.step,
                sample: step.sample,
                candidates: ids,
                map: step.map,
            });
        }
        state.window = window;
        state.refs = refs;
        state.nodes = nodes;

        info!(
            stream = %state.stream,
            steps = state.window.len(),
            candidates = state.refs.len(),
            "Restored state memory from snapshot"
        );
        Ok(state)
    }
}

fn validate<S: Sample, C, T>(snapshot: &KStateSnapshot<S, C, T>) -> KStateResult<()> {
    let steps = &snapshot.steps;

    if let (Some(first), Some(last)) = (steps.first(), steps.last()) {
        if snapshot
            .config
            .exceeds_span(first.sample.time(), last.sample.time())
        {
            return Err(invalid("window exceeds its duration bound"));
        }
        if snapshot.next_step <= last.step.0 {
            return Err(invalid(format!(
                "next step {} does not follow {}",
                snapshot.next_step, last.step
            )));
        }
    }
    if snapshot.config.exceeds_size(steps.len()) {
        return Err(invalid("window exceeds its size bound"));
    }

    let mut seen: HashSet<CandidateId> = HashSet::new();
    let mut successors: HashMap<CandidateId, usize> = HashMap::new();
    let mut previous: Option<&StepSnapshot<S, C, T>> = None;

    for step in steps {
        if let Some(prev) = previous {
            if prev.step.next() != step.step {
                return Err(invalid(format!("{} does not follow {}", step.step, prev.step)));
            }
            if step.sample.time() < prev.sample.time() {
                return Err(invalid(format!("{} is older than {}", step.step, prev.step)));
            }
        }
        if step.candidates.is_empty() {
            return Err(invalid(format!("{} has no candidates", step.step)));
        }
        if !step.candidates.iter().any(|c| c.id == step.map) {
            return Err(invalid(format!(
                "MAP {} is not a member of {}",
                step.map, step.step
            )));
        }

        for c in &step.candidates {
            if c.id.0 >= snapshot.next_id {
                return Err(invalid(format!("{} was never handed out", c.id)));
            }
            if !seen.insert(c.id) {
                return Err(invalid(format!("{} appears twice", c.id)));
            }
            let Some(predecessor) = c.predecessor else {
                continue;
            };
            let linked = previous.is_some_and(|p| p.candidates.iter().any(|pc| pc.id == predecessor));
            if !linked {
                return Err(invalid(format!(
                    "{} names {} outside the preceding step",
                    c.id, predecessor
                )));
            }
            *successors.entry(predecessor).or_insert(0) += 1;
        }
        previous = Some(step);
    }

    for step in steps {
        for c in &step.candidates {
            let expected = successors.get(&c.id).copied().unwrap_or(0);
            if c.references != expected {
                return Err(invalid(format!(
                    "{} records {} references, links give {}",
                    c.id, c.references, expected
                )));
            }
        }
    }
    Ok(())
}
