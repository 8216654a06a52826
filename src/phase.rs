use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Month;

/// Financing phase a month falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before completion: no operating revenue.
    Construction,
    /// Completed, before the refinancing checkpoint.
    Stabilization,
    /// From the refinancing checkpoint through exit.
    Exit,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Construction, Phase::Stabilization, Phase::Exit];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Construction => "construction",
            Phase::Stabilization => "stabilization",
            Phase::Exit => "exit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a month to its phase.
///
/// Construction wins while the (possibly delayed) completion month has not
/// been reached, even if the delay pushes completion past the checkpoint.
pub fn classify(month: Month, completion: Month, checkpoint: Month) -> Phase {
    if month < completion {
        Phase::Construction
    } else if month < checkpoint {
        Phase::Stabilization
    } else {
        Phase::Exit
    }
}
