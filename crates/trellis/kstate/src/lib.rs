//! # trellis-kstate
//!
//! Bounded state memory for online Viterbi decoding.
//!
//! Every update brings a batch of weighted candidates for one sample. The
//! memory keeps enough of the lattice to backtrace the most probable path
//! ending at the newest sample, drops whatever no longer can be on such a
//! path, and bounds the rest by step count and/or elapsed sample time.
//!
//! ```text
//!   update(sample, batch)
//!          │
//!          ▼
//!   ┌─────────────────┐
//!   │ validate        │  ← out-of-order / inconsistent batch rejected, no mutation
//!   └────────┬────────┘
//!            ▼
//!   ┌─────────────────┐
//!   │ register        │  ← ids assigned, predecessor reference counts up
//!   └────────┬────────┘
//!            ▼
//!   ┌─────────────────┐
//!   │ prune           │  ← unreferenced candidates collected, cascading backward
//!   └────────┬────────┘
//!            ▼
//!   ┌─────────────────┐
//!   │ append + evict  │  ← oldest steps dropped while a bound is exceeded
//!   └─────────────────┘
//! ```
//!
//! ## Key Principles
//!
//! - **Ids, not references**: candidates live in an arena; predecessor links
//!   and the reference table are keyed by [`CandidateId`].
//! - **MAP candidates anchor the backtrace**: a step's MAP candidate is never
//!   garbage-collected while its step is retained.
//! - **Atomic updates**: a rejected update changes nothing.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use trellis_kstate::{KState, KStateConfig, NewCandidate, StateCandidate};
//!
//! struct Fix(f64);
//!
//! impl StateCandidate for Fix {
//!     fn sequence_probability(&self) -> f64 { self.0 }
//!     fn filter_probability(&self) -> f64 { self.0 }
//! }
//!
//! let mut state: KState<_, Fix> = KState::new(KStateConfig::unbounded().with_size_bound(10));
//! let t0 = Utc.timestamp_opt(0, 0).unwrap();
//! let first = state
//!     .update(t0, vec![NewCandidate::root(Fix(0.7)), NewCandidate::root(Fix(0.3))])
//!     .unwrap();
//!
//! let t1 = Utc.timestamp_opt(5, 0).unwrap();
//! state
//!     .update(t1, vec![NewCandidate::following(Fix(0.6), first.assigned[1])])
//!     .unwrap();
//!
//! let path: Vec<_> = state.best_sequence_ids();
//! assert_eq!(path, vec![first.assigned[1], state.current_candidates()[0].id]);
//! ```

#![deny(unsafe_code)]

pub mod memory;
pub mod query;
pub mod report;
pub mod snapshot;
pub mod view;

mod refs;
mod window;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use memory::KState;
pub use report::{KStateStats, UpdateReport};
pub use snapshot::{CandidateSnapshot, KStateSnapshot, StepSnapshot};
pub use view::{CandidateRef, StepView};

pub use trellis_types::{
    CandidateId, KStateConfig, KStateError, KStateResult, NewCandidate, Sample, StateCandidate,
    StepId, StreamId,
};
