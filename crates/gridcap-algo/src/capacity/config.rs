//! Analysis configuration, read from a JSON document.
//!
//! ```json
//! {
//!   "case_name": "case5_headroom.m",
//!   "upper_load_limit_p_mw": 100.0,
//!   "upper_gen_limit_p_mw": 80.0,
//!   "selected_buses_ids": [3, 5],
//!   "connection_scenario": {"4": {"load": {"p_mw": 20.0}}}
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use gridcap_core::{p_to_mva, BusId, GridCapError, GridCapResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::contingency::ContingencyScenario;
use crate::power_flow::PowerFlowOptions;
use crate::violations::ViolationsLimits;

/// Extra power applied at a bus after every case reload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPower {
    pub p_mw: f64,
    #[serde(default = "default_power_factor")]
    pub pf: f64,
}

impl ConnectionPower {
    pub fn mva(&self) -> Complex64 {
        p_to_mva(self.p_mw, self.pf)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BusConnection {
    #[serde(default)]
    pub load: Option<ConnectionPower>,
    #[serde(default)]
    pub gen: Option<ConnectionPower>,
}

/// Connections keyed by bus number, applied in ascending bus order
pub type ConnectionScenario = BTreeMap<BusId, BusConnection>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Case file; relative paths are taken from the config file's directory
    pub case_name: PathBuf,
    pub upper_load_limit_p_mw: f64,
    pub upper_gen_limit_p_mw: f64,
    #[serde(default = "default_power_factor")]
    pub load_power_factor: f64,
    #[serde(default = "default_power_factor")]
    pub gen_power_factor: f64,
    #[serde(default)]
    pub selected_buses_ids: Option<Vec<BusId>>,
    #[serde(default = "default_tolerance")]
    pub headroom_tolerance_p_mw: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "ViolationsLimits::normal")]
    pub normal_limits: ViolationsLimits,
    #[serde(default = "ViolationsLimits::contingency")]
    pub contingency_limits: ViolationsLimits,
    #[serde(default)]
    pub contingency_scenario: Option<ContingencyScenario>,
    #[serde(default)]
    pub connection_scenario: Option<ConnectionScenario>,
    #[serde(default)]
    pub solver_opts: PowerFlowOptions,
    #[serde(default)]
    pub treat_violations_as_warnings: bool,
}

fn default_power_factor() -> f64 {
    0.9
}

fn default_tolerance() -> f64 {
    5.0
}

fn default_max_iterations() -> usize {
    10
}

impl AnalysisConfig {
    /// Defaults for everything but the case and the two upper limits.
    pub fn new(
        case_name: impl Into<PathBuf>,
        upper_load_limit_p_mw: f64,
        upper_gen_limit_p_mw: f64,
    ) -> Self {
        Self {
            case_name: case_name.into(),
            upper_load_limit_p_mw,
            upper_gen_limit_p_mw,
            load_power_factor: default_power_factor(),
            gen_power_factor: default_power_factor(),
            selected_buses_ids: None,
            headroom_tolerance_p_mw: default_tolerance(),
            max_iterations: default_max_iterations(),
            normal_limits: ViolationsLimits::normal(),
            contingency_limits: ViolationsLimits::contingency(),
            contingency_scenario: None,
            connection_scenario: None,
            solver_opts: PowerFlowOptions::default(),
            treat_violations_as_warnings: false,
        }
    }

    pub fn upper_load_limit_mva(&self) -> Complex64 {
        p_to_mva(self.upper_load_limit_p_mw, self.load_power_factor)
    }

    pub fn upper_gen_limit_mva(&self) -> Complex64 {
        p_to_mva(self.upper_gen_limit_p_mw, self.gen_power_factor)
    }

    pub fn validate(&self) -> GridCapResult<()> {
        check_power_factor("load_power_factor", self.load_power_factor)?;
        check_power_factor("gen_power_factor", self.gen_power_factor)?;
        check_non_negative("upper_load_limit_p_mw", self.upper_load_limit_p_mw)?;
        check_non_negative("upper_gen_limit_p_mw", self.upper_gen_limit_p_mw)?;
        check_non_negative("headroom_tolerance_p_mw", self.headroom_tolerance_p_mw)?;
        if self.max_iterations < 1 {
            return Err(GridCapError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.normal_limits.validate("normal_limits")?;
        self.contingency_limits.validate("contingency_limits")?;
        for (bus, connection) in self.connection_scenario.iter().flatten() {
            for (kind, power) in [("load", connection.load), ("gen", connection.gen)] {
                if let Some(power) = power {
                    let field = format!("connection_scenario.{bus}.{kind}.pf");
                    check_power_factor(&field, power.pf)?;
                }
            }
        }
        Ok(())
    }

    pub fn is_selected(&self, bus: BusId) -> bool {
        self.selected_buses_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&bus))
    }
}

fn check_power_factor(field: &str, pf: f64) -> GridCapResult<()> {
    if pf > 0.0 && pf <= 1.0 {
        Ok(())
    } else {
        Err(GridCapError::Config(format!(
            "{field} must be in (0, 1], got {pf}"
        )))
    }
}

fn check_non_negative(field: &str, value: f64) -> GridCapResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GridCapError::Config(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}

/// Read, resolve and validate an analysis config.
pub fn load_config(path: &Path) -> GridCapResult<AnalysisConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading analysis config '{}'", path.display()))?;
    let mut config: AnalysisConfig = serde_json::from_str(&text)
        .map_err(|err| GridCapError::Config(format!("{}: {err}", path.display())))?;
    if config.case_name.is_relative() {
        if let Some(dir) = path.parent() {
            config.case_name = dir.join(&config.case_name);
        }
    }
    config.validate()?;
    Ok(config)
}
