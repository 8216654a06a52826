use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::AggregateResult;
use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::resolver::{self, TrialOutcome};
use crate::sampler::Sampler;
use crate::types::{Month, TrialId};

pub const DEFAULT_ITERATIONS: u64 = 30_000;

/// How trials are scheduled. Each trial owns a generator seeded from
/// `seed + trial index`, so both modes yield identical outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    Serial,
    #[default]
    Parallel,
}

/// Runs independent PF trials and aggregates their outcomes.
pub struct MonteCarlo {
    config: SimulationConfig,
    sampler: Sampler,
    iterations: u64,
    horizon: Month,
    execution: Execution,
}

impl MonteCarlo {
    /// Validate `config` and prepare its distributions. The horizon defaults
    /// to the exit month.
    pub fn from_config(config: SimulationConfig) -> Result<Self, ConfigError> {
        let sampler = Sampler::new(&config)?;
        let horizon = Month(config.timeline.exit_month);
        Ok(MonteCarlo {
            config,
            sampler,
            iterations: DEFAULT_ITERATIONS,
            horizon,
            execution: Execution::default(),
        })
    }

    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = n;
        self
    }

    /// Override the month horizon. Shorter than the exit month leaves
    /// surviving trials as `survived_no_exit`.
    pub fn until(mut self, horizon: Month) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn horizon(&self) -> Month {
        self.horizon
    }

    /// Run one trial by index.
    pub fn trial(&self, id: TrialId) -> TrialOutcome {
        let mut rng = ChaCha20Rng::seed_from_u64(id.seed(self.config.seed));
        resolver::run_trial(&self.config, &self.sampler, self.horizon, &mut rng)
    }

    pub fn run(&self) -> Result<AggregateResult, ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if self.horizon.0 == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        if self.horizon.0 < self.config.timeline.exit_month {
            warn!(
                horizon = self.horizon.0,
                exit_month = self.config.timeline.exit_month,
                "horizon ends before exit; surviving trials will be reported as survived_no_exit"
            );
        }

        info!(
            iterations = self.iterations,
            horizon = self.horizon.0,
            seed = self.config.seed,
            execution = ?self.execution,
            "starting PF simulation"
        );
        let started = Instant::now();

        let outcomes: Vec<TrialOutcome> = match self.execution {
            Execution::Serial => (0..self.iterations).map(|i| self.trial(TrialId(i))).collect(),
            Execution::Parallel => (0..self.iterations)
                .into_par_iter()
                .map(|i| self.trial(TrialId(i)))
                .collect(),
        };

        let last = self.horizon.min(Month(self.config.timeline.exit_month));
        let result = AggregateResult::from_outcomes(outcomes, last);
        debug!(frequencies = ?result.frequencies, "aggregated outcomes");
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            insolvency_rate = result.insolvency_rate(),
            exits = result.frequencies.exit,
            "PF simulation complete"
        );
        Ok(result)
    }
}
