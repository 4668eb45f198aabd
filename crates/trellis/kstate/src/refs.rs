//! Reference-count table.
//!
//! Maps every live candidate to the number of candidates in the next step
//! that name it as predecessor. A candidate is tracked here exactly as long
//! as it is retained by some step.

use std::collections::HashMap;

use trellis_types::CandidateId;

#[derive(Clone, Debug, Default)]
pub(crate) struct ReferenceTable {
    counts: HashMap<CandidateId, usize>,
}

impl ReferenceTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id` with no successors.
    pub(crate) fn register(&mut self, id: CandidateId) {
        self.counts.insert(id, 0);
    }

    /// Restore a tracked candidate with a known count.
    pub(crate) fn register_with(&mut self, id: CandidateId, count: usize) {
        self.counts.insert(id, count);
    }

    /// Record one more successor. Returns the new count, `None` if untracked.
    pub(crate) fn increment(&mut self, id: CandidateId) -> Option<usize> {
        let count = self.counts.get_mut(&id)?;
        *count += 1;
        Some(*count)
    }

    /// Record one successor fewer. Saturates at zero.
    pub(crate) fn decrement(&mut self, id: CandidateId) -> Option<usize> {
        let count = self.counts.get_mut(&id)?;
        *count = count.saturating_sub(1);
        Some(*count)
    }

    pub(crate) fn remove(&mut self, id: CandidateId) -> Option<usize> {
        self.counts.remove(&id)
    }

    pub(crate) fn count(&self, id: CandidateId) -> Option<usize> {
        self.counts.get(&id).copied()
    }

    pub(crate) fn contains(&self, id: CandidateId) -> bool {
        self.counts.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.counts.len()
    }

    pub(crate) fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_candidates_start_at_zero() {
        let mut table = ReferenceTable::new();
        table.register(CandidateId(1));
        assert_eq!(table.count(CandidateId(1)), Some(0));
        assert!(table.contains(CandidateId(1)));
        assert!(!table.contains(CandidateId(2)));
    }

    #[test]
    fn increment_and_decrement_track_successors() {
        let mut table = ReferenceTable::new();
        table.register(CandidateId(1));
        assert_eq!(table.increment(CandidateId(1)), Some(1));
        assert_eq!(table.increment(CandidateId(1)), Some(2));
        assert_eq!(table.decrement(CandidateId(1)), Some(1));
        assert_eq!(table.decrement(CandidateId(1)), Some(0));
        assert_eq!(table.decrement(CandidateId(1)), Some(0));
    }

    #[test]
    fn untracked_ids_are_ignored() {
        let mut table = ReferenceTable::new();
        assert_eq!(table.increment(CandidateId(5)), None);
        assert_eq!(table.decrement(CandidateId(5)), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn remove_and_clear() {
        let mut table = ReferenceTable::new();
        table.register(CandidateId(1));
        table.register_with(CandidateId(2), 3);
        assert_eq!(table.remove(CandidateId(2)), Some(3));
        assert_eq!(table.len(), 1);
        table.clear();
        assert_eq!(table.len(), 0);
    }
}
