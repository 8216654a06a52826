use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::phase::Phase;

/// A triangular distribution given as (min, mode, max).
/// A collapsed spec (min = mode = max) is a point mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangularSpec {
    pub min: f64,
    pub mode: f64,
    pub max: f64,
}

impl TriangularSpec {
    pub const fn new(min: f64, mode: f64, max: f64) -> Self {
        TriangularSpec { min, mode, max }
    }

    pub const fn point(value: f64) -> Self {
        TriangularSpec { min: value, mode: value, max: value }
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    pub fn mean(&self) -> f64 {
        (self.min + self.mode + self.max) / 3.0
    }

    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        for value in [self.min, self.mode, self.max] {
            finite(name, value)?;
        }
        if !(self.min <= self.mode && self.mode <= self.max) {
            return Err(ConfigError::TriangularBounds {
                name,
                min: self.min,
                mode: self.mode,
                max: self.max,
            });
        }
        Ok(())
    }

    /// As `validate`, and additionally rejects a negative lower bound.
    pub fn validate_non_negative(&self, name: &'static str) -> Result<(), ConfigError> {
        self.validate(name)?;
        non_negative(name, self.min)
    }
}

/// Revenue, rate and capitalization terms that apply while a trial is in one
/// financing phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Monthly operating revenue, drawn once per trial.
    pub revenue: TriangularSpec,
    /// Annual interest rate, redrawn every month.
    pub rate: TriangularSpec,
    /// Share of each month's interest added to principal instead of paid.
    pub capitalized_ratio: f64,
}

impl PhaseConfig {
    fn validate(&self, phase: Phase) -> Result<(), ConfigError> {
        let (revenue, rate, ratio) = match phase {
            Phase::Construction => (
                "construction.revenue",
                "construction.rate",
                "construction.capitalized_ratio",
            ),
            Phase::Stabilization => (
                "stabilization.revenue",
                "stabilization.rate",
                "stabilization.capitalized_ratio",
            ),
            Phase::Exit => ("exit.revenue", "exit.rate", "exit.capitalized_ratio"),
        };
        self.revenue.validate_non_negative(revenue)?;
        self.rate.validate_non_negative(rate)?;
        unit_ratio(ratio, self.capitalized_ratio)
    }
}

/// Timeline milestones in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Planned completion month; the realised completion adds a sampled delay.
    pub completion_target: u32,
    /// Month of the refinancing (court-opening) event.
    pub refinance_checkpoint: u32,
    /// Month the asset is sold and the trial's IRR is realised.
    pub exit_month: u32,
}

impl Timeline {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion_target < self.refinance_checkpoint
            && self.refinance_checkpoint < self.exit_month
        {
            Ok(())
        } else {
            Err(ConfigError::Timeline {
                completion_target: self.completion_target,
                refinance_checkpoint: self.refinance_checkpoint,
                exit_month: self.exit_month,
            })
        }
    }
}

/// Immutable parameter set for one PF simulation run.
/// Monetary values are in KRW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub initial_equity: f64,
    pub senior_loan: f64,
    pub monthly_fixed_cost: f64,
    /// Capitalization rate for income-approach valuation (annual income / value).
    pub capitalization_rate: f64,
    pub timeline: Timeline,
    /// Months of construction delay beyond `timeline.completion_target`,
    /// truncated to a whole month.
    pub completion_delay: TriangularSpec,
    pub construction: PhaseConfig,
    pub stabilization: PhaseConfig,
    pub exit: PhaseConfig,
    /// Loan-to-value a refinancing lender will accept at the checkpoint.
    pub target_ltv: TriangularSpec,
}

impl SimulationConfig {
    pub fn canonical() -> Self {
        SimulationConfig {
            seed: 42,
            initial_equity: 4_900_000_000.0,
            senior_loan: 19_000_000_000.0,
            monthly_fixed_cost: 150_000_000.0,
            capitalization_rate: 0.065,
            timeline: Timeline {
                completion_target: 14,
                refinance_checkpoint: 24,
                exit_month: 36,
            },
            completion_delay: TriangularSpec::new(0.0, 2.0, 8.0),
            // Bridge-loan pricing, half the interest rolled into principal.
            construction: PhaseConfig {
                revenue: TriangularSpec::point(0.0),
                rate: TriangularSpec::new(0.09, 0.14, 0.16),
                capitalized_ratio: 0.5,
            },
            stabilization: PhaseConfig {
                revenue: TriangularSpec::new(150_000_000.0, 250_000_000.0, 350_000_000.0),
                rate: TriangularSpec::new(0.08, 0.11, 0.14),
                capitalized_ratio: 0.3,
            },
            // Post court-opening: refinanced at term-loan rates, all interest paid in cash.
            exit: PhaseConfig {
                revenue: TriangularSpec::new(200_000_000.0, 280_000_000.0, 360_000_000.0),
                rate: TriangularSpec::new(0.06, 0.08, 0.10),
                capitalized_ratio: 0.0,
            },
            target_ltv: TriangularSpec::new(0.50, 0.60, 0.70),
        }
    }

    pub fn phase(&self, phase: Phase) -> &PhaseConfig {
        match phase {
            Phase::Construction => &self.construction,
            Phase::Stabilization => &self.stabilization,
            Phase::Exit => &self.exit,
        }
    }

    /// Reject any configuration a trial could not run on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_equity", self.initial_equity)?;
        finite("senior_loan", self.senior_loan)?;
        non_negative("senior_loan", self.senior_loan)?;
        finite("monthly_fixed_cost", self.monthly_fixed_cost)?;
        non_negative("monthly_fixed_cost", self.monthly_fixed_cost)?;
        // A zero cap rate would make every income-approach value infinite.
        positive("capitalization_rate", self.capitalization_rate)?;
        self.timeline.validate()?;
        self.completion_delay.validate_non_negative("completion_delay")?;
        for phase in Phase::ALL {
            self.phase(phase).validate(phase)?;
        }
        self.target_ltv.validate_non_negative("target_ltv")?;
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Log-normal parameters in log space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalSpec {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalSpec {
    pub mean: f64,
    pub std_dev: f64,
}

/// Parameters of the single-phase equity runway model: how long the sponsor's
/// equity lasts through the "dead zone" between construction delay and the
/// first operating cash flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunwayConfig {
    pub seed: u64,
    pub initial_equity: f64,
    pub loan_principal: f64,
    pub monthly_burn: f64,
    pub construction_delay: LogNormalSpec,
    pub operational_gap: NormalSpec,
    /// Annual rate, drawn once per trial.
    pub rate: TriangularSpec,
    pub capitalization_ratio: f64,
    /// Planned month of the first operating cash flow, marked on reports.
    pub target_milestone: u32,
}

impl RunwayConfig {
    pub fn canonical() -> Self {
        RunwayConfig {
            seed: 42,
            initial_equity: 4_900_000_000.0,
            loan_principal: 19_000_000_000.0,
            monthly_burn: 150_000_000.0,
            // Median delay of 2 months.
            construction_delay: LogNormalSpec { mu: 2.0_f64.ln(), sigma: 0.5 },
            operational_gap: NormalSpec { mean: 14.0, std_dev: 2.0 },
            // Skewed towards 14% under current market conditions.
            rate: TriangularSpec::new(0.09, 0.14, 0.16),
            capitalization_ratio: 0.5,
            target_milestone: 14,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_equity", self.initial_equity)?;
        finite("loan_principal", self.loan_principal)?;
        non_negative("loan_principal", self.loan_principal)?;
        finite("monthly_burn", self.monthly_burn)?;
        non_negative("monthly_burn", self.monthly_burn)?;
        finite("construction_delay.mu", self.construction_delay.mu)?;
        finite("construction_delay.sigma", self.construction_delay.sigma)?;
        non_negative("construction_delay.sigma", self.construction_delay.sigma)?;
        finite("operational_gap.mean", self.operational_gap.mean)?;
        finite("operational_gap.std_dev", self.operational_gap.std_dev)?;
        non_negative("operational_gap.std_dev", self.operational_gap.std_dev)?;
        self.rate.validate_non_negative("rate")?;
        unit_ratio("capitalization_ratio", self.capitalization_ratio)
    }
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

fn unit_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RatioOutOfRange { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_configs_are_valid() {
        assert_eq!(SimulationConfig::canonical().validate(), Ok(()));
        assert_eq!(RunwayConfig::canonical().validate(), Ok(()));
    }

    #[test]
    fn reversed_triangular_is_rejected_not_reordered() {
        let mut config = SimulationConfig::canonical();
        config.stabilization.rate = TriangularSpec::new(0.14, 0.11, 0.08);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TriangularBounds { name: "stabilization.rate", .. })
        ));
    }

    #[test]
    fn mode_outside_bounds_is_rejected() {
        let mut config = SimulationConfig::canonical();
        config.target_ltv = TriangularSpec::new(0.5, 0.8, 0.7);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TriangularBounds { name: "target_ltv", .. })
        ));
    }

    #[test]
    fn milestones_must_be_strictly_increasing() {
        let mut config = SimulationConfig::canonical();
        config.timeline.refinance_checkpoint = config.timeline.exit_month;
        assert!(matches!(config.validate(), Err(ConfigError::Timeline { .. })));

        config.timeline = Timeline { completion_target: 24, refinance_checkpoint: 24, exit_month: 36 };
        assert!(matches!(config.validate(), Err(ConfigError::Timeline { .. })));
    }

    #[test]
    fn zero_capitalization_rate_is_rejected() {
        let mut config = SimulationConfig::canonical();
        config.capitalization_rate = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "capitalization_rate", value: 0.0 })
        );
    }

    #[test]
    fn capitalized_ratio_must_be_a_fraction() {
        let mut config = SimulationConfig::canonical();
        config.exit.capitalized_ratio = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { name: "exit.capitalized_ratio", .. })
        ));
    }

    #[test]
    fn nan_is_rejected() {
        let mut config = SimulationConfig::canonical();
        config.monthly_fixed_cost = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn partial_json_overrides_canonical_defaults() {
        let json = r#"{ "initial_equity": 1000000.0, "timeline": { "completion_target": 6, "refinance_checkpoint": 12, "exit_month": 24 } }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.initial_equity, 1_000_000.0);
        assert_eq!(config.timeline.exit_month, 24);
        assert_eq!(config.senior_loan, SimulationConfig::canonical().senior_loan);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn runway_rejects_negative_spread() {
        let mut config = RunwayConfig::canonical();
        config.operational_gap.std_dev = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Negative { .. })));
    }
}
