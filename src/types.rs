use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time in months (1-based: month 1 is the first month after
/// financing closes). Month 0 is never simulated; it marks "before the first
/// step" when a milestone is expressed as an offset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Month(pub u32);

impl Month {
    pub const MONTHS_PER_YEAR: u32 = 12;

    pub fn next(self) -> Self {
        Month(self.0 + 1)
    }

    /// Advance by a number of months (used to place the completion milestone
    /// after a sampled delay). Saturates at `u32::MAX`, which no trial reaches.
    pub fn offset(self, months: u32) -> Self {
        Month(self.0.saturating_add(months))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Zero-based index of a trial within one Monte Carlo run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrialId(pub u64);

impl TrialId {
    /// Seed for this trial's private generator.
    pub fn seed(self, base_seed: u64) -> u64 {
        base_seed.wrapping_add(self.0)
    }
}
