//! AC power-flow solvers
//!
//! - [`newton`]: full Newton-Raphson (FNSL) with a dense Jacobian
//! - [`fast_decoupled`]: fixed-slope decoupled Newton-Raphson (FDNS), B'/B''
//!
//! Both run on a [`PowerFlowModel`] and report failure to converge through
//! [`PowerFlowSolution::converged`]; a singular matrix or a state that blows
//! up is a non-converged solve, not an error.

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

pub mod fast_decoupled;
pub mod model;
pub mod newton;

pub use model::{PowerFlowModel, TwoPort, TwoPortSource};

/// Bus type classification for power flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// V and θ fixed, P and Q calculated
    Slack,
    /// P and |V| specified, Q and θ calculated
    PV,
    /// P and Q specified, |V| and θ calculated
    PQ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMethod {
    /// Fixed-slope decoupled Newton-Raphson
    #[default]
    Fdns,
    /// Full Newton-Raphson
    Fnsl,
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverMethod::Fdns => f.write_str("FDNS"),
            SolverMethod::Fnsl => f.write_str("FNSL"),
        }
    }
}

/// Solver settings, the `solver_opts` block of an analysis config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowOptions {
    /// Largest allowed P/Q mismatch (p.u.)
    pub tolerance: f64,
    /// Newton-Raphson iteration cap; the decoupled solver gets five times this
    pub max_iterations: usize,
    /// Start from 1.0 p.u. / 0 rad instead of the voltages stored in the case
    pub flat_start: bool,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 20,
            flat_start: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PowerFlowSolution {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
    pub method: SolverMethod,
    /// Voltage magnitudes per model bus (p.u.)
    pub v_mag: Vec<f64>,
    /// Voltage angles per model bus (radians)
    pub v_ang: Vec<f64>,
}

impl PowerFlowSolution {
    /// Complex bus voltages, in model bus order
    pub fn voltages(&self) -> Vec<Complex64> {
        self.v_mag
            .iter()
            .zip(&self.v_ang)
            .map(|(&m, &a)| Complex64::from_polar(m, a))
            .collect()
    }
}

/// Solve the model with the chosen method.
pub fn solve(
    model: &PowerFlowModel,
    method: SolverMethod,
    options: &PowerFlowOptions,
) -> PowerFlowSolution {
    let (mut v_mag, mut v_ang) = initial_state(model, options.flat_start);
    let outcome = match method {
        SolverMethod::Fnsl => newton::newton_raphson(model, options, &mut v_mag, &mut v_ang),
        SolverMethod::Fdns => {
            fast_decoupled::fast_decoupled(model, options, &mut v_mag, &mut v_ang)
        }
    };
    let finite = v_mag.iter().chain(&v_ang).all(|x| x.is_finite());
    PowerFlowSolution {
        converged: outcome.converged && finite,
        iterations: outcome.iterations,
        max_mismatch: outcome.max_mismatch,
        method,
        v_mag,
        v_ang,
    }
}

fn initial_state(model: &PowerFlowModel, flat_start: bool) -> (Vec<f64>, Vec<f64>) {
    let v_mag = model
        .bus_types
        .iter()
        .zip(&model.v_set)
        .map(|(bus_type, &v)| match bus_type {
            BusType::Slack | BusType::PV => v,
            BusType::PQ if flat_start => 1.0,
            BusType::PQ => v,
        })
        .collect();
    let v_ang = if flat_start {
        vec![0.0; model.size]
    } else {
        model.v_case_angle.clone()
    };
    (v_mag, v_ang)
}

/// Outcome of one iterative solve
pub(crate) struct Iterations {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
}

/// Non-slack buses carry a P equation, PQ buses also a Q equation.
pub(crate) fn equation_buses(model: &PowerFlowModel) -> (Vec<usize>, Vec<usize>) {
    let mut p_buses = Vec::new();
    let mut q_buses = Vec::new();
    for (i, bus_type) in model.bus_types.iter().enumerate() {
        if *bus_type != BusType::Slack {
            p_buses.push(i);
        }
        if *bus_type == BusType::PQ {
            q_buses.push(i);
        }
    }
    (p_buses, q_buses)
}

/// P and Q injections from the current voltage state
pub(crate) fn compute_power(
    model: &PowerFlowModel,
    v_mag: &[f64],
    v_ang: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let n = model.size;
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let y = model.y_bus[i][j];
            if y.re == 0.0 && y.im == 0.0 {
                continue;
            }
            let theta_ij = v_ang[i] - v_ang[j];
            let (sin, cos) = theta_ij.sin_cos();
            // P_i = Σ V_i V_j (G_ij cos θ_ij + B_ij sin θ_ij)
            p[i] += v_mag[i] * v_mag[j] * (y.re * cos + y.im * sin);
            // Q_i = Σ V_i V_j (G_ij sin θ_ij - B_ij cos θ_ij)
            q[i] += v_mag[i] * v_mag[j] * (y.re * sin - y.im * cos);
        }
    }
    (p, q)
}

/// Largest absolute mismatch over the P and Q equations
pub(crate) fn max_mismatch(
    model: &PowerFlowModel,
    p_buses: &[usize],
    q_buses: &[usize],
    p_calc: &[f64],
    q_calc: &[f64],
) -> f64 {
    let dp = p_buses.iter().map(|&i| (model.p_spec[i] - p_calc[i]).abs());
    let dq = q_buses.iter().map(|&i| (model.q_spec[i] - q_calc[i]).abs());
    dp.chain(dq).fold(0.0, f64::max)
}

#[cfg(test)]
pub(crate) mod test_cases {
    use gridcap_core::{
        Branch, Bus, BusId, BusKind, Gen, Load, Megavars, Megawatts, Network, PerUnit, Ratings,
    };

    /// Three buses in a ring: swing at 1, a PV machine at 2, a load at 3.
    pub fn three_bus(load_mw: f64) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus {
            id: BusId::new(1),
            kind: BusKind::Swing,
            voltage_pu: PerUnit(1.02),
            ..Bus::default()
        });
        network.add_bus(Bus {
            id: BusId::new(2),
            kind: BusKind::Pv,
            voltage_pu: PerUnit(1.01),
            ..Bus::default()
        });
        network.add_bus(Bus { id: BusId::new(3), ..Bus::default() });
        for (from, to, x) in [(1, 2, 0.1), (2, 3, 0.2), (1, 3, 0.15)] {
            network
                .add_branch(Branch {
                    from_bus: BusId::new(from),
                    to_bus: BusId::new(to),
                    resistance: x / 10.0,
                    reactance: x,
                    charging_b: 0.02,
                    ratings: Ratings::uniform(150.0),
                    ..Branch::default()
                })
                .unwrap();
        }
        network
            .add_gen(Gen::new(BusId::new(2), "1", Megawatts(40.0), Megavars(0.0)))
            .unwrap();
        network
            .add_load(Load::new(BusId::new(3), "1", Megawatts(load_mw), Megavars(load_mw / 4.0)))
            .unwrap();
        network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_methods_agree() {
        let model = PowerFlowModel::from_network(&test_cases::three_bus(90.0));
        let options = PowerFlowOptions::default();
        let nr = solve(&model, SolverMethod::Fnsl, &options);
        let fd = solve(&model, SolverMethod::Fdns, &options);
        assert!(nr.converged);
        assert!(fd.converged);
        for i in 0..model.size {
            assert!((nr.v_mag[i] - fd.v_mag[i]).abs() < 1e-4);
            assert!((nr.v_ang[i] - fd.v_ang[i]).abs() < 1e-4);
        }
        assert!(nr.iterations < fd.iterations);
    }

    #[test]
    fn test_set_points_are_held() {
        let model = PowerFlowModel::from_network(&test_cases::three_bus(90.0));
        let solution = solve(&model, SolverMethod::Fnsl, &PowerFlowOptions::default());
        assert_eq!(solution.v_mag[0], 1.02);
        assert_eq!(solution.v_mag[1], 1.01);
        assert_eq!(solution.v_ang[0], 0.0);
        assert!(solution.v_mag[2] < 1.01);
    }

    #[test]
    fn test_heavy_load_does_not_converge() {
        let model = PowerFlowModel::from_network(&test_cases::three_bus(5000.0));
        let options = PowerFlowOptions::default();
        assert!(!solve(&model, SolverMethod::Fnsl, &options).converged);
        assert!(!solve(&model, SolverMethod::Fdns, &options).converged);
    }

    #[test]
    fn test_options_defaults_from_partial_json() {
        let options: PowerFlowOptions = serde_json::from_str(r#"{"flat_start": false}"#).unwrap();
        assert_eq!(options.max_iterations, 20);
        assert_eq!(options.tolerance, 1e-6);
        assert!(!options.flat_start);
    }
}
