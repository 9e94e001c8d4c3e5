//! The engine seam between the analysis and a power-flow backend.
//!
//! A [`GridEngine`] owns exactly one mutable network state. Element queries
//! are views recomputed from that state (and the last solution) on every
//! call, so nothing returned here survives a mutation.

use std::path::Path;

use gridcap_core::{BranchKey, BusId, GridCapResult, Rate, Trafo3wKey};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::power_flow::SolverMethod;

pub mod guards;
pub mod native;
#[cfg(test)]
pub(crate) mod testing;

pub use guards::{DisabledBranch, DisabledTrafo, TemporaryGen, TemporaryLoad, TEMPORARY_ID};
pub use native::NativeEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRecord {
    pub number: BusId,
    pub name: String,
    /// Type code: 1 = PQ, 2 = PV, 3 = swing, 4 = isolated
    #[serde(rename = "type")]
    pub kind: i32,
    pub voltage_pu: f64,
}

/// A branch or 2-winding transformer with its loading for one rating set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub key: BranchKey,
    pub enabled: bool,
    pub loading_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trafo3wRecord {
    pub key: Trafo3wKey,
    pub enabled: bool,
    pub loading_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingBusRecord {
    pub number: BusId,
    pub p_mw: f64,
}

/// A load or machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerRecord {
    pub bus: BusId,
    pub id: String,
    pub mva: Complex64,
}

pub trait GridEngine {
    /// Load a case, replacing the current state; a missing path is an
    /// `Io` error of kind `NotFound`.
    fn open_case(&mut self, path: &Path) -> GridCapResult<()>;

    /// Reload the last opened case, discarding mutations and the solution.
    fn reload_case(&mut self) -> GridCapResult<()>;

    /// Attempt a solve. Non-convergence is reported by [`is_converged`],
    /// only hard failures are errors.
    ///
    /// [`is_converged`]: GridEngine::is_converged
    fn run_solver(&mut self, method: SolverMethod) -> GridCapResult<()>;

    fn is_converged(&self) -> bool;

    fn buses(&self) -> Vec<BusRecord>;

    fn branches(&self, rate: Rate) -> Vec<BranchRecord>;

    fn trafos(&self, rate: Rate) -> Vec<BranchRecord>;

    fn trafos3w(&self, rate: Rate) -> Vec<Trafo3wRecord>;

    fn swing_buses(&self) -> Vec<SwingBusRecord>;

    fn loads(&self) -> Vec<PowerRecord>;

    fn machines(&self) -> Vec<PowerRecord>;

    /// Add a load; `false` when it could not be placed.
    fn add_load(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool>;

    fn remove_load(&mut self, bus: BusId, id: &str) -> GridCapResult<bool>;

    fn add_machine(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool>;

    fn remove_machine(&mut self, bus: BusId, id: &str) -> GridCapResult<bool>;

    /// Switch a branch; `false` when it was already in that state.
    fn set_branch_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool>;

    fn set_trafo_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool>;
}

/// Sum of the load records at one bus
pub fn bus_load_mva<E: GridEngine + ?Sized>(engine: &E, bus: BusId) -> Complex64 {
    engine.loads().iter().filter(|l| l.bus == bus).map(|l| l.mva).sum()
}

/// Sum of the machine records at one bus
pub fn bus_gen_mva<E: GridEngine + ?Sized>(engine: &E, bus: BusId) -> Complex64 {
    engine.machines().iter().filter(|m| m.bus == bus).map(|m| m.mva).sum()
}
