use serde::Serialize;

use crate::resolver::{TrialOutcome, TrialStatus};
use crate::types::Month;

/// Distribution statistics for a continuous metric across trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Linear-interpolated percentiles plus mean and sample std-dev.
/// Sorts `values` in place; returns None for an empty slice.
pub fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

/// Count of trials per terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusFrequencies {
    pub total: usize,
    pub default: usize,
    pub refi_fail: usize,
    pub exit: usize,
    pub survived_no_exit: usize,
}

impl StatusFrequencies {
    pub fn record(&mut self, status: TrialStatus) {
        self.total += 1;
        match status {
            TrialStatus::Default => self.default += 1,
            TrialStatus::RefiFail => self.refi_fail += 1,
            TrialStatus::Exit => self.exit += 1,
            TrialStatus::SurvivedNoExit => self.survived_no_exit += 1,
        }
    }

    pub fn count(&self, status: TrialStatus) -> usize {
        match status {
            TrialStatus::Default => self.default,
            TrialStatus::RefiFail => self.refi_fail,
            TrialStatus::Exit => self.exit,
            TrialStatus::SurvivedNoExit => self.survived_no_exit,
        }
    }

    /// Share of all trials with `status`, in [0, 1]. Zero when there are no trials.
    pub fn share(&self, status: TrialStatus) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(status) as f64 / self.total as f64
        }
    }
}

/// Every trial's outcome plus the statistics derived from them.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    /// One outcome per trial, in trial order.
    pub outcomes: Vec<TrialOutcome>,
    /// Last month any trial could reach: the horizon capped at the exit month.
    pub horizon: Month,
    pub frequencies: StatusFrequencies,
    /// IRR over exit trials only; None when no trial exited.
    pub irr: Option<DistStats>,
    /// Terminal month over default trials only.
    pub default_month: Option<DistStats>,
    /// Default count by month; index 0 is month 1.
    pub default_histogram: Vec<usize>,
}

impl AggregateResult {
    pub fn from_outcomes(outcomes: Vec<TrialOutcome>, horizon: Month) -> Self {
        let mut frequencies = StatusFrequencies::default();
        let mut irrs = Vec::new();
        let mut default_months = Vec::new();
        let mut default_histogram = vec![0usize; horizon.0 as usize];

        for outcome in &outcomes {
            frequencies.record(outcome.status());
            match outcome {
                TrialOutcome::Exit { irr, .. } => irrs.push(*irr),
                TrialOutcome::Default { month } => {
                    default_months.push(month.0 as f64);
                    if let Some(slot) = default_histogram.get_mut(month.0 as usize - 1) {
                        *slot += 1;
                    }
                }
                _ => {}
            }
        }

        AggregateResult {
            irr: percentile_stats(&mut irrs),
            default_month: percentile_stats(&mut default_months),
            outcomes,
            horizon,
            frequencies,
            default_histogram,
        }
    }

    pub fn iterations(&self) -> usize {
        self.outcomes.len()
    }

    /// Share of trials that defaulted.
    pub fn insolvency_rate(&self) -> f64 {
        self.frequencies.share(TrialStatus::Default)
    }

    /// Mean default month, if any trial defaulted.
    pub fn mean_default_month(&self) -> Option<f64> {
        self.default_month.as_ref().map(|d| d.mean)
    }
}
