//! Per-trial state machine: walks the months, steps the cash-flow engine and
//! decides whether the trial defaults, fails to refinance, exits or simply
//! runs out of horizon.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::engine::{self, MonthFlow, MonthTerms, SimulationState};
use crate::phase::{self, Phase};
use crate::sampler::Sampler;
use crate::types::Month;

/// Terminal state of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Default,
    RefiFail,
    Exit,
    SurvivedNoExit,
}

impl TrialStatus {
    pub const ALL: [TrialStatus; 4] = [
        TrialStatus::Default,
        TrialStatus::RefiFail,
        TrialStatus::Exit,
        TrialStatus::SurvivedNoExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrialStatus::Default => "default",
            TrialStatus::RefiFail => "refi_fail",
            TrialStatus::Exit => "exit",
            TrialStatus::SurvivedNoExit => "survived_no_exit",
        }
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single record a trial produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Equity reached zero at the end of `month`.
    Default { month: Month },
    /// Principal exceeded what a lender would refinance at the checkpoint.
    RefiFail {
        month: Month,
        principal: f64,
        max_refinanceable: f64,
    },
    /// Asset sold at the exit month.
    Exit {
        month: Month,
        /// Exit equity floored at zero.
        final_equity: f64,
        /// Annualised; exactly -1.0 on a wipeout.
        irr: f64,
    },
    /// Horizon ended before the exit month.
    SurvivedNoExit,
}

impl TrialOutcome {
    pub fn status(&self) -> TrialStatus {
        match self {
            TrialOutcome::Default { .. } => TrialStatus::Default,
            TrialOutcome::RefiFail { .. } => TrialStatus::RefiFail,
            TrialOutcome::Exit { .. } => TrialStatus::Exit,
            TrialOutcome::SurvivedNoExit => TrialStatus::SurvivedNoExit,
        }
    }

    pub fn month(&self) -> Option<Month> {
        match self {
            TrialOutcome::Default { month }
            | TrialOutcome::RefiFail { month, .. }
            | TrialOutcome::Exit { month, .. } => Some(*month),
            TrialOutcome::SurvivedNoExit => None,
        }
    }

    pub fn final_equity(&self) -> Option<f64> {
        match self {
            TrialOutcome::Exit { final_equity, .. } => Some(*final_equity),
            _ => None,
        }
    }

    pub fn irr(&self) -> Option<f64> {
        match self {
            TrialOutcome::Exit { irr, .. } => Some(*irr),
            _ => None,
        }
    }
}

/// One month of a traced trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthRecord {
    pub month: Month,
    pub phase: Phase,
    pub revenue: f64,
    pub annual_rate: f64,
    pub flow: MonthFlow,
    /// Balances at the end of the month.
    pub equity: f64,
    pub principal: f64,
}

/// Income-approach value: annualised monthly revenue over the cap rate.
pub fn income_value(monthly_revenue: f64, capitalization_rate: f64) -> f64 {
    monthly_revenue * Month::MONTHS_PER_YEAR as f64 / capitalization_rate
}

/// Annualised return on `initial_equity` realised as `exit_equity` after
/// `months`. A non-positive exit equity is a wipeout at -1.0.
pub fn exit_irr(exit_equity: f64, initial_equity: f64, months: Month) -> f64 {
    if exit_equity > 0.0 {
        (exit_equity / initial_equity).powf(Month::MONTHS_PER_YEAR as f64 / months.0 as f64) - 1.0
    } else {
        -1.0
    }
}

/// Run one trial to its terminal state over months 1..=horizon.
///
/// `sampler` must have been built from `config`.
pub fn run_trial(
    config: &SimulationConfig,
    sampler: &Sampler,
    horizon: Month,
    rng: &mut impl Rng,
) -> TrialOutcome {
    resolve(config, sampler, horizon, rng, |_| {})
}

/// As `run_trial`, also returning every simulated month.
pub fn run_trial_traced(
    config: &SimulationConfig,
    sampler: &Sampler,
    horizon: Month,
    rng: &mut impl Rng,
) -> (TrialOutcome, Vec<MonthRecord>) {
    let last = horizon.min(Month(config.timeline.exit_month));
    let mut trace = Vec::with_capacity(last.0 as usize);
    let outcome = resolve(config, sampler, horizon, rng, |record| trace.push(record));
    (outcome, trace)
}

fn resolve(
    config: &SimulationConfig,
    sampler: &Sampler,
    horizon: Month,
    rng: &mut impl Rng,
    mut on_month: impl FnMut(MonthRecord),
) -> TrialOutcome {
    let draws = sampler.draw_trial(rng);
    let completion = Month(config.timeline.completion_target).offset(draws.completion_delay);
    let checkpoint = Month(config.timeline.refinance_checkpoint);
    let exit = Month(config.timeline.exit_month);
    let last = horizon.min(exit);

    let mut state = SimulationState::new(config.initial_equity, config.senior_loan);

    while state.month < last {
        let month = state.month.next();
        let phase = phase::classify(month, completion, checkpoint);
        let revenue = draws.revenue(phase);
        let annual_rate = sampler.annual_rate(phase, rng);
        let flow = engine::step(
            &mut state,
            &MonthTerms {
                revenue,
                annual_rate,
                capitalized_ratio: config.phase(phase).capitalized_ratio,
                fixed_cost: config.monthly_fixed_cost,
            },
        );
        on_month(MonthRecord {
            month,
            phase,
            revenue,
            annual_rate,
            flow,
            equity: state.equity,
            principal: state.principal,
        });

        // Default dominates every other check in the same month.
        if state.is_insolvent() {
            return TrialOutcome::Default { month };
        }

        if month == checkpoint {
            let asset_value = income_value(revenue, config.capitalization_rate);
            let max_refinanceable = asset_value * sampler.target_ltv(rng);
            if state.principal > max_refinanceable {
                return TrialOutcome::RefiFail {
                    month,
                    principal: state.principal,
                    max_refinanceable,
                };
            }
        }

        if month == exit {
            let asset_value = income_value(revenue, config.capitalization_rate);
            let exit_equity = asset_value - state.principal;
            return TrialOutcome::Exit {
                month,
                final_equity: exit_equity.max(0.0),
                irr: exit_irr(exit_equity, config.initial_equity, month),
            };
        }
    }

    TrialOutcome::SurvivedNoExit
}
