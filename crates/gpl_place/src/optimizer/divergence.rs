//! Divergence detection for the Nesterov loop.
//!
//! Late in a run, overflow should keep falling. If it climbs back up while
//! wirelength blows past its value at the best point, the penalty has run
//! away and the loop is stopped.

/// Overflow below which divergence is checked.
const WINDOW: f64 = 0.3;
/// Overflow rise over the minimum that counts as regression.
const RISE: f64 = 0.02;
/// HPWL growth over the value at the minimum that counts as regression.
const HPWL_RATIO: f64 = 1.2;

/// Result of observing one iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Verdict {
    /// Overflow reached a new minimum.
    NewMinimum,
    /// Nothing notable.
    Steady,
    /// The run is diverging.
    Diverged,
}

#[derive(Clone, Debug)]
pub(crate) struct DivergenceTracker {
    min_overflow: f64,
    hpwl_at_min: f64,
}

impl DivergenceTracker {
    pub(crate) fn new() -> Self {
        Self {
            min_overflow: f64::INFINITY,
            hpwl_at_min: 0.0,
        }
    }

    /// Forgets the recorded minimum.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn observe(&mut self, overflow: f64, hpwl: f64) -> Verdict {
        if !overflow.is_finite() || !hpwl.is_finite() {
            return Verdict::Diverged;
        }
        if overflow < self.min_overflow {
            self.min_overflow = overflow;
            self.hpwl_at_min = hpwl;
            return Verdict::NewMinimum;
        }
        if overflow < WINDOW
            && overflow - self.min_overflow >= RISE
            && hpwl > HPWL_RATIO * self.hpwl_at_min
        {
            return Verdict::Diverged;
        }
        Verdict::Steady
    }
}
