//! Monthly cash-flow update for one trial.
//!
//! The engine is phase-agnostic: the caller resolves the phase and hands in
//! that phase's revenue, annual rate and capitalized-interest ratio.

use serde::Serialize;

use crate::types::Month;

/// Running state of one trial. Owned by exactly one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationState {
    /// Month most recently completed (0 before the first step).
    pub month: Month,
    /// Sponsor equity; may reach or cross zero, which ends the trial.
    pub equity: f64,
    /// Outstanding senior principal, never negative.
    pub principal: f64,
}

impl SimulationState {
    pub fn new(initial_equity: f64, principal: f64) -> Self {
        SimulationState {
            month: Month(0),
            equity: initial_equity,
            principal,
        }
    }

    pub fn is_insolvent(&self) -> bool {
        self.equity <= 0.0
    }
}

/// Terms in force for one month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthTerms {
    pub revenue: f64,
    pub annual_rate: f64,
    pub capitalized_ratio: f64,
    pub fixed_cost: f64,
}

/// Breakdown of one month's step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthFlow {
    pub interest: f64,
    pub paid_interest: f64,
    pub capitalized_interest: f64,
    pub net_cash_flow: f64,
    /// Principal repaid from surplus cash this month.
    pub swept: f64,
    /// Surplus left after the loan was fully repaid, credited to equity.
    pub released_to_equity: f64,
}

/// Advance `state` by exactly one month.
///
/// Interest accrues on the opening principal. The capitalized share is added
/// to principal; the cash share is paid with the fixed cost out of revenue.
/// A surplus sweeps principal down (any excess over full payoff goes to
/// equity); a deficit is drawn from equity.
pub fn step(state: &mut SimulationState, terms: &MonthTerms) -> MonthFlow {
    let monthly_rate = terms.annual_rate / Month::MONTHS_PER_YEAR as f64;
    let interest = state.principal * monthly_rate;
    let capitalized_interest = interest * terms.capitalized_ratio;
    let paid_interest = interest * (1.0 - terms.capitalized_ratio);
    state.principal += capitalized_interest;

    let net_cash_flow = terms.revenue - (terms.fixed_cost + paid_interest);

    let mut swept = 0.0;
    let mut released_to_equity = 0.0;
    if net_cash_flow > 0.0 {
        if net_cash_flow > state.principal {
            swept = state.principal;
            released_to_equity = net_cash_flow - state.principal;
            state.principal = 0.0;
            state.equity += released_to_equity;
        } else {
            swept = net_cash_flow;
            state.principal -= net_cash_flow;
        }
    } else {
        state.equity += net_cash_flow;
    }

    state.month = state.month.next();

    MonthFlow {
        interest,
        paid_interest,
        capitalized_interest,
        net_cash_flow,
        swept,
        released_to_equity,
    }
}
