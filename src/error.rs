use std::path::PathBuf;

use thiserror::Error;

/// A configuration that must be rejected before any trial runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Triangular bounds violate min <= mode <= max.
    #[error("{name}: triangular bounds must satisfy min <= mode <= max (got {min}, {mode}, {max})")]
    TriangularBounds {
        name: &'static str,
        min: f64,
        mode: f64,
        max: f64,
    },
    #[error("{name}: value {value} is not finite")]
    NonFinite { name: &'static str, value: f64 },
    #[error("{name}: ratio {value} outside [0, 1]")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("{name}: must be strictly positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name}: must be non-negative (got {value})")]
    Negative { name: &'static str, value: f64 },
    /// Milestones must satisfy completion_target < refinance_checkpoint < exit_month.
    #[error(
        "timeline must satisfy completion_target < refinance_checkpoint < exit_month \
         (got {completion_target}, {refinance_checkpoint}, {exit_month})"
    )]
    Timeline {
        completion_target: u32,
        refinance_checkpoint: u32,
        exit_month: u32,
    },
    #[error("iteration count must be at least 1")]
    NoIterations,
    #[error("simulation horizon must be at least 1 month")]
    EmptyHorizon,
}

/// Failure while writing a report artifact.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
