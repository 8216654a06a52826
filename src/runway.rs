//! Single-phase equity runway model.
//!
//! Each trial draws a "dead zone" (construction delay plus the gap before the
//! first operating cash flow) and one annual rate, then burns equity on the
//! fixed cost plus the full month's interest while part of that interest is
//! also rolled into principal. The trial either exhausts equity inside the
//! dead zone or survives past it.

use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::RunwayConfig;
use crate::error::ConfigError;
use crate::sampler::TriangularDraw;
use crate::simulation::Execution;
use crate::types::{Month, TrialId};

pub const DEFAULT_ITERATIONS: u64 = 10_000;
pub const DEFAULT_MONTHS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunwayOutcome {
    Insolvent { month: Month },
    Survived,
}

impl RunwayOutcome {
    pub fn month(&self) -> Option<Month> {
        match self {
            RunwayOutcome::Insolvent { month } => Some(*month),
            RunwayOutcome::Survived => None,
        }
    }
}

/// Distributions for the runway model, prepared once per run.
pub struct RunwayModel {
    config: RunwayConfig,
    construction_delay: LogNormal<f64>,
    operational_gap: Normal<f64>,
    rate: TriangularDraw,
}

impl RunwayModel {
    pub fn new(config: RunwayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let construction_delay =
            LogNormal::new(config.construction_delay.mu, config.construction_delay.sigma)
                .map_err(|_| ConfigError::Negative {
                    name: "construction_delay.sigma",
                    value: config.construction_delay.sigma,
                })?;
        let operational_gap =
            Normal::new(config.operational_gap.mean, config.operational_gap.std_dev).map_err(
                |_| ConfigError::Negative {
                    name: "operational_gap.std_dev",
                    value: config.operational_gap.std_dev,
                },
            )?;
        let rate = TriangularDraw::new(&config.rate, "rate")?;
        Ok(RunwayModel { config, construction_delay, operational_gap, rate })
    }

    pub fn config(&self) -> &RunwayConfig {
        &self.config
    }

    /// Whole months until first operating cash flow (may be zero or
    /// negative for an extreme gap draw, in which case nothing is at risk).
    pub fn dead_zone(&self, rng: &mut impl Rng) -> i64 {
        let delay = self.construction_delay.sample(rng);
        let gap = self.operational_gap.sample(rng);
        (delay + gap).trunc() as i64
    }

    /// Run one trial over months 1..=months.
    pub fn run_trial(&self, months: u32, rng: &mut impl Rng) -> RunwayOutcome {
        let dead_zone = self.dead_zone(rng);
        let monthly_rate = self.rate.sample(rng) / Month::MONTHS_PER_YEAR as f64;

        let mut equity = self.config.initial_equity;
        let mut principal = self.config.loan_principal;

        for m in 1..=months {
            if i64::from(m) > dead_zone {
                break;
            }
            let interest = principal * monthly_rate;
            equity -= interest + self.config.monthly_burn;
            principal += interest * self.config.capitalization_ratio;

            if equity <= 0.0 {
                return RunwayOutcome::Insolvent { month: Month(m) };
            }
        }
        RunwayOutcome::Survived
    }
}

/// Outcome of a runway run.
#[derive(Debug, Clone)]
pub struct RunwaySummary {
    pub months: u32,
    pub outcomes: Vec<RunwayOutcome>,
    pub insolvent: usize,
    pub survived: usize,
    /// Insolvent trials per month up to the latest exhaustion; index 0 is
    /// month 1.
    pub histogram: Vec<usize>,
}

impl RunwaySummary {
    pub fn from_outcomes(outcomes: Vec<RunwayOutcome>, months: u32) -> Self {
        let latest = outcomes.iter().filter_map(|o| o.month()).max().map_or(0, |m| m.0);
        let mut histogram = vec![0usize; latest as usize];
        let mut insolvent = 0;
        for month in outcomes.iter().filter_map(|o| o.month()) {
            insolvent += 1;
            histogram[month.0 as usize - 1] += 1;
        }
        let survived = outcomes.len() - insolvent;
        RunwaySummary { months, outcomes, insolvent, survived, histogram }
    }

    /// Insolvent share of trials, as a percentage.
    pub fn insolvency_rate_pct(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.insolvent as f64 / self.outcomes.len() as f64 * 100.0
        }
    }

    /// Mean exhaustion month over insolvent trials; 0 when none.
    pub fn mean_exhaustion_month(&self) -> f64 {
        if self.insolvent == 0 {
            return 0.0;
        }
        let total: u64 = self
            .outcomes
            .iter()
            .filter_map(|o| o.month())
            .map(|m| u64::from(m.0))
            .sum();
        total as f64 / self.insolvent as f64
    }

    /// Months-to-insolvency with survivors encoded as `months + 1`.
    pub fn exhaustion_months(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .map(|o| o.month().map_or(self.months + 1, |m| m.0))
            .collect()
    }
}

/// Run `iterations` runway trials.
pub fn run(
    model: &RunwayModel,
    iterations: u64,
    months: u32,
    execution: Execution,
) -> Result<RunwaySummary, ConfigError> {
    if iterations == 0 {
        return Err(ConfigError::NoIterations);
    }
    if months == 0 {
        return Err(ConfigError::EmptyHorizon);
    }
    info!(iterations, months, seed = model.config.seed, "starting runway simulation");
    let started = Instant::now();

    let trial = |i: u64| {
        let mut rng = ChaCha20Rng::seed_from_u64(TrialId(i).seed(model.config.seed));
        model.run_trial(months, &mut rng)
    };
    let outcomes: Vec<RunwayOutcome> = match execution {
        Execution::Serial => (0..iterations).map(trial).collect(),
        Execution::Parallel => (0..iterations).into_par_iter().map(trial).collect(),
    };

    let summary = RunwaySummary::from_outcomes(outcomes, months);
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        insolvency_rate_pct = summary.insolvency_rate_pct(),
        "runway simulation complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogNormalSpec, NormalSpec, TriangularSpec};

    fn rng(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    /// Degenerate spreads: dead zone fixed at 2 + 14 = 16 months, 12% rate.
    fn fixed_config() -> RunwayConfig {
        RunwayConfig {
            seed: 1,
            initial_equity: 1_000_000.0,
            loan_principal: 10_000_000.0,
            monthly_burn: 50_000.0,
            construction_delay: LogNormalSpec { mu: 2.0_f64.ln(), sigma: 0.0 },
            operational_gap: NormalSpec { mean: 14.0, std_dev: 0.0 },
            rate: TriangularSpec::point(0.12),
            capitalization_ratio: 0.5,
            target_milestone: 14,
        }
    }

    #[test]
    fn dead_zone_is_fixed_without_spread() {
        let model = RunwayModel::new(fixed_config()).unwrap();
        // exp(ln 2) may land a hair under 2.0; truncation then gives 15.
        let dz = model.dead_zone(&mut rng(1));
        assert!(dz == 15 || dz == 16, "dead zone {dz}");
    }

    #[test]
    fn full_interest_and_burn_hit_equity() {
        let mut config = fixed_config();
        config.operational_gap.mean = 40.0;
        let model = RunwayModel::new(config).unwrap();
        // Month 1: interest 100k + burn 50k = 150k; principal grows by 50k.
        // Equity falls by at least 150k a month, so it is gone by month 7.
        let outcome = model.run_trial(30, &mut rng(1));
        let month = outcome.month().expect("must exhaust equity").0;
        assert!((6..=7).contains(&month), "exhausted at month {month}");
    }

    #[test]
    fn surviving_the_dead_zone_stops_the_burn() {
        let mut config = fixed_config();
        config.initial_equity = 10_000_000.0;
        let model = RunwayModel::new(config).unwrap();
        assert_eq!(model.run_trial(30, &mut rng(1)), RunwayOutcome::Survived);
    }

    #[test]
    fn horizon_shorter_than_dead_zone_survives() {
        let mut config = fixed_config();
        config.initial_equity = 2_000_000.0;
        let model = RunwayModel::new(config).unwrap();
        assert_eq!(model.run_trial(3, &mut rng(1)), RunwayOutcome::Survived);
    }

    #[test]
    fn summary_encodes_survivors_past_the_horizon() {
        let outcomes = vec![
            RunwayOutcome::Insolvent { month: Month(4) },
            RunwayOutcome::Survived,
            RunwayOutcome::Insolvent { month: Month(8) },
            RunwayOutcome::Survived,
        ];
        let summary = RunwaySummary::from_outcomes(outcomes, 30);
        assert_eq!(summary.exhaustion_months(), vec![4, 31, 8, 31]);
        assert_eq!(summary.insolvency_rate_pct(), 50.0);
        assert_eq!(summary.mean_exhaustion_month(), 6.0);
        assert_eq!(summary.histogram[3], 1);
        assert_eq!(summary.histogram[7], 1);
        assert_eq!(summary.histogram.len(), 8);
    }

    #[test]
    fn huge_horizon_does_not_size_the_histogram() {
        let model = RunwayModel::new(fixed_config()).unwrap();
        let summary = run(&model, 20, u32::MAX, Execution::Serial).unwrap();
        assert!(summary.histogram.len() <= 16);
        assert_eq!(summary.exhaustion_months().len(), 20);
    }

    #[test]
    fn canonical_run_is_reproducible_across_execution_modes() {
        let model = RunwayModel::new(RunwayConfig::canonical()).unwrap();
        let serial = run(&model, 1_000, DEFAULT_MONTHS, Execution::Serial).unwrap();
        let parallel = run(&model, 1_000, DEFAULT_MONTHS, Execution::Parallel).unwrap();
        assert_eq!(serial.outcomes, parallel.outcomes);
        assert_eq!(serial.insolvent + serial.survived, 1_000);
    }

    /// Canonical equity covers about 15 months of burn against a ~16 month
    /// dead zone, so a substantial share of trials but not all run dry.
    #[test]
    fn canonical_insolvency_rate_is_material() {
        let model = RunwayModel::new(RunwayConfig::canonical()).unwrap();
        let summary = run(&model, 5_000, DEFAULT_MONTHS, Execution::Parallel).unwrap();
        let rate = summary.insolvency_rate_pct();
        assert!(rate > 5.0 && rate < 95.0, "insolvency rate {rate:.1}%");
        assert!(summary.mean_exhaustion_month() > 10.0);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let model = RunwayModel::new(RunwayConfig::canonical()).unwrap();
        assert_eq!(
            run(&model, 0, DEFAULT_MONTHS, Execution::Serial).unwrap_err(),
            ConfigError::NoIterations
        );
    }
}
