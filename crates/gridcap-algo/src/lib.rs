//! # gridcap-algo: hosting-capacity analysis
//!
//! How much extra load or generation can each bus of a transmission case
//! take before a steady-state limit breaks, with the network intact and
//! under every single (N-1) outage that the base case itself survives?
//!
//! ## Layers
//!
//! | module | role |
//! |--------|------|
//! | [`power_flow`] | AC power flow: full Newton-Raphson (FNSL) and fixed-slope decoupled (FDNS) |
//! | [`engine`] | The [`GridEngine`] seam, [`NativeEngine`] and the scoped mutation guards |
//! | [`violations`] | One solve classified into [`Violations`] flags, with per-element stats |
//! | [`contingency`] | N-1 scenario building and the first-failure contingency replay |
//! | [`capacity`] | The per-bus bisection search, its stats and its configuration |
//!
//! The analysis code only talks to a [`GridEngine`], so any backend that can
//! open a case, solve it, report element results and toggle elements will do.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gridcap_algo::capacity::{load_config, CapacityAnalyser};
//! use gridcap_algo::NativeEngine;
//!
//! fn main() -> Result<(), gridcap_core::GridCapError> {
//!     let config = load_config(std::path::Path::new("analysis.json"))?;
//!     let engine = NativeEngine::new(config.solver_opts);
//!     let mut analyser = CapacityAnalyser::new(engine, config)?;
//!     for bus in analyser.buses_headroom()? {
//!         println!("{}: {:.1} MW", bus.bus.number, bus.load_avail_mva.re);
//!     }
//!     Ok(())
//! }
//! ```

pub mod capacity;
pub mod context;
pub mod contingency;
pub mod engine;
pub mod power_flow;
pub mod violations;

pub use capacity::{
    buses_headroom, AnalysisConfig, BusHeadroom, CapacityAnalyser, CapacityAnalysisStats, Headroom,
};
pub use context::AnalysisContext;
pub use contingency::{ContingencyScenario, LimitingFactor, LimitingSubsystem};
pub use engine::{GridEngine, NativeEngine};
pub use power_flow::{PowerFlowOptions, SolverMethod};
pub use violations::{Violations, ViolationsLimits, ViolationsStats};
