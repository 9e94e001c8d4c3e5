//! N-1 contingency screening.
//!
//! [`build_contingency_scenario`] selects the single outages the base case
//! survives; [`contingency_limiting_factor`] replays them against a
//! candidate operating point and reports the first one that breaks it.

use std::fmt;

use gridcap_core::BranchKey;
use serde::{Deserialize, Serialize};

use crate::violations::Violations;

pub mod checker;
pub mod scenario;

pub use checker::contingency_limiting_factor;
pub use scenario::build_contingency_scenario;

/// Element whose outage produced a violation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LimitingSubsystem {
    /// Violation of the intact network
    #[default]
    None,
    Branch(BranchKey),
    Trafo(BranchKey),
}

impl LimitingSubsystem {
    pub fn is_none(&self) -> bool {
        matches!(self, LimitingSubsystem::None)
    }
}

impl fmt::Display for LimitingSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitingSubsystem::None => f.write_str("-"),
            LimitingSubsystem::Branch(key) => write!(f, "branch {key}"),
            LimitingSubsystem::Trafo(key) => write!(f, "trafo {key}"),
        }
    }
}

/// Violations that stopped a search, and the outage that caused them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitingFactor {
    pub v: Violations,
    pub ss: LimitingSubsystem,
}

impl LimitingFactor {
    pub fn new(v: Violations, ss: LimitingSubsystem) -> Self {
        Self { v, ss }
    }

    /// A result of the intact-network check
    pub fn normal(v: Violations) -> Self {
        Self::new(v, LimitingSubsystem::None)
    }

    pub fn is_clean(&self) -> bool {
        self.v == Violations::NO_VIOLATIONS
    }
}

impl fmt::Display for LimitingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ss.is_none() {
            write!(f, "{}", self.v)
        } else {
            write!(f, "{} ({})", self.v, self.ss)
        }
    }
}

/// Single outages re-tested at every candidate operating point
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContingencyScenario {
    #[serde(default)]
    pub branches: Vec<BranchKey>,
    #[serde(default)]
    pub trafos: Vec<BranchKey>,
}

impl ContingencyScenario {
    pub fn len(&self) -> usize {
        self.branches.len() + self.trafos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ContingencyScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} branches, {} trafos",
            self.branches.len(),
            self.trafos.len()
        )
    }
}
