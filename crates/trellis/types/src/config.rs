//! Window configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounds on how much history a state memory retains.
///
/// Both bounds are independent; when both are set the tighter one wins.
/// `None` leaves that axis unbounded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KStateConfig {
    /// Retain at most `size_bound + 1` steps.
    pub size_bound: Option<usize>,
    /// Retain steps no older than this relative to the newest sample.
    pub duration_bound: Option<Duration>,
}

impl KStateConfig {
    /// No bound on either axis.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Map the signed convention (negative = unbounded, duration in
    /// milliseconds) onto the typed form.
    pub fn from_signed(size_bound: i64, duration_bound_ms: i64) -> Self {
        Self {
            size_bound: usize::try_from(size_bound).ok(),
            duration_bound: u64::try_from(duration_bound_ms)
                .ok()
                .map(Duration::from_millis),
        }
    }

    pub fn with_size_bound(mut self, k: usize) -> Self {
        self.size_bound = Some(k);
        self
    }

    pub fn with_duration_bound(mut self, span: Duration) -> Self {
        self.duration_bound = Some(span);
        self
    }

    /// Maximum number of retained steps, if bounded.
    pub fn max_steps(&self) -> Option<usize> {
        self.size_bound.map(|k| k.saturating_add(1))
    }

    /// Whether `steps` retained steps violate the size bound.
    pub fn exceeds_size(&self, steps: usize) -> bool {
        self.max_steps().is_some_and(|max| steps > max)
    }

    /// Whether the span from `oldest` to `newest` violates the duration bound.
    pub fn exceeds_span(&self, oldest: DateTime<Utc>, newest: DateTime<Utc>) -> bool {
        let Some(bound) = self.duration_bound else {
            return false;
        };
        // A negative span cannot exceed anything.
        match (newest - oldest).to_std() {
            Ok(span) => span > bound,
            Err(_) => false,
        }
    }
}
