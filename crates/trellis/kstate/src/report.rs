//! Reports returned by state memory operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_types::{CandidateId, StepId};

/// Outcome of one accepted update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Step the batch was inserted as. `None` for an empty batch.
    pub step: Option<StepId>,
    /// Identifiers assigned to the batch, in input order.
    pub assigned: Vec<CandidateId>,
    /// MAP candidate of the new step.
    pub map: Option<CandidateId>,
    /// Candidates garbage-collected from older steps.
    pub collected: usize,
    /// Whole steps evicted by the window bounds.
    pub evicted: usize,
}

impl UpdateReport {
    pub(crate) fn unchanged() -> Self {
        Self {
            step: None,
            assigned: Vec::new(),
            map: None,
            collected: 0,
            evicted: 0,
        }
    }

    /// Whether the update left the memory as it was.
    pub fn is_noop(&self) -> bool {
        self.step.is_none()
    }
}

/// State memory statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KStateStats {
    pub steps: usize,
    pub candidates: usize,
    pub oldest_time: Option<DateTime<Utc>>,
    pub newest_time: Option<DateTime<Utc>>,
    /// Non-empty updates accepted since construction.
    pub updates_applied: u64,
    /// Candidates removed by garbage collection since construction.
    pub candidates_collected: u64,
    /// Steps removed by window eviction since construction.
    pub steps_evicted: u64,
}
