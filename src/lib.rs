pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod phase;
pub mod report;
pub mod resolver;
pub mod runway;
pub mod sampler;
pub mod simulation;
pub mod types;

pub use error::{ConfigError, Error, ReportError, Result};
