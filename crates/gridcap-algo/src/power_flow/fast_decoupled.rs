//! Fixed-slope decoupled Newton-Raphson (FDNS)
//!
//! Stott-Alsac decoupling, XB variant:
//! - B' for the P-θ half-iteration: `ΔP/V = B' × Δθ`, built from series
//!   reactances only (no resistance, taps or shunts)
//! - B'' for the Q-V half-iteration: `ΔQ/V = B'' × ΔV`, the negated
//!   susceptance part of the Y-bus
//!
//! Both matrices are constant, so they are factored once per solve.
//!
//! ## References
//!
//! - Stott & Alsac (1974): "Fast Decoupled Load Flow"
//!   IEEE Trans. PAS, 93(3), 859-869
//!   DOI: [10.1109/TPAS.1974.293985](https://doi.org/10.1109/TPAS.1974.293985)

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};

use super::{compute_power, equation_buses, max_mismatch, Iterations, PowerFlowModel};
use super::PowerFlowOptions;

/// Decoupled iterations allowed per Newton-Raphson iteration
pub const ITERATION_FACTOR: usize = 5;

/// B' over the full model (rows and columns in model bus order).
///
/// B'_ij = -1/x_ij for connected buses, B'_ii = Σ 1/x_ik
pub fn build_b_prime(model: &PowerFlowModel) -> Vec<Vec<f64>> {
    let n = model.size;
    let mut b_prime = vec![vec![0.0; n]; n];
    for port in &model.two_ports {
        let x = port.reactance.abs().max(1e-6);
        let b = 1.0 / x;
        b_prime[port.from][port.to] -= b;
        b_prime[port.to][port.from] -= b;
        b_prime[port.from][port.from] += b;
        b_prime[port.to][port.to] += b;
    }
    b_prime
}

/// B'' over the full model: `-Im(Y_bus)`, so taps, charging and shunts count.
pub fn build_b_double_prime(model: &PowerFlowModel) -> Vec<Vec<f64>> {
    model
        .y_bus
        .iter()
        .map(|row| row.iter().map(|y| -y.im).collect())
        .collect()
}

fn reduce(full: &[Vec<f64>], buses: &[usize]) -> Mat<f64> {
    let n = buses.len();
    let mut mat = Mat::zeros(n, n);
    for (r, &i) in buses.iter().enumerate() {
        for (c, &j) in buses.iter().enumerate() {
            mat.write(r, c, full[i][j]);
        }
    }
    mat
}

fn solve_factored<S: SpSolver<f64>>(lu: &S, b: &[f64]) -> Option<Vec<f64>> {
    let mut rhs = Mat::zeros(b.len(), 1);
    for (i, &value) in b.iter().enumerate() {
        rhs.write(i, 0, value);
    }
    let solution = lu.solve(&rhs);
    let x: Vec<f64> = (0..b.len()).map(|i| solution.read(i, 0)).collect();
    x.iter().all(|v| v.is_finite()).then_some(x)
}

pub(crate) fn fast_decoupled(
    model: &PowerFlowModel,
    options: &PowerFlowOptions,
    v_mag: &mut [f64],
    v_ang: &mut [f64],
) -> Iterations {
    let (p_buses, q_buses) = equation_buses(model);
    if p_buses.is_empty() && q_buses.is_empty() {
        return Iterations {
            converged: true,
            iterations: 0,
            max_mismatch: 0.0,
        };
    }
    let b_prime = reduce(&build_b_prime(model), &p_buses).partial_piv_lu();
    let b_double_prime = reduce(&build_b_double_prime(model), &q_buses).partial_piv_lu();
    let max_iterations = options.max_iterations * ITERATION_FACTOR;

    for iter in 0..max_iterations {
        let (p_calc, q_calc) = compute_power(model, v_mag, v_ang);
        let worst = max_mismatch(model, &p_buses, &q_buses, &p_calc, &q_calc);
        if !worst.is_finite() {
            break;
        }
        if worst < options.tolerance {
            return Iterations {
                converged: true,
                iterations: iter,
                max_mismatch: worst,
            };
        }

        if !p_buses.is_empty() {
            let dp: Vec<f64> = p_buses
                .iter()
                .map(|&i| (model.p_spec[i] - p_calc[i]) / v_mag[i])
                .collect();
            let Some(d_theta) = solve_factored(&b_prime, &dp) else {
                break;
            };
            for (k, &i) in p_buses.iter().enumerate() {
                v_ang[i] += d_theta[k];
            }
        }

        if !q_buses.is_empty() {
            let (_, q_calc) = compute_power(model, v_mag, v_ang);
            let dq: Vec<f64> = q_buses
                .iter()
                .map(|&i| (model.q_spec[i] - q_calc[i]) / v_mag[i])
                .collect();
            let Some(d_v) = solve_factored(&b_double_prime, &dq) else {
                break;
            };
            for (k, &i) in q_buses.iter().enumerate() {
                v_mag[i] += d_v[k];
            }
        }
    }

    let (p_calc, q_calc) = compute_power(model, v_mag, v_ang);
    let worst = max_mismatch(model, &p_buses, &q_buses, &p_calc, &q_calc);
    Iterations {
        converged: worst < options.tolerance,
        iterations: max_iterations,
        max_mismatch: worst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power_flow::test_cases::three_bus;

    #[test]
    fn test_b_prime_matrix_construction() {
        let model = PowerFlowModel::from_network(&three_bus(90.0));
        let b_prime = build_b_prime(&model);
        // bus 1 connects to bus 2 (1/0.1) and bus 3 (1/0.15)
        assert!((b_prime[0][0] - 16.67).abs() < 0.01);
        assert!((b_prime[0][1] + 10.0).abs() < 1e-9);
        let row: f64 = b_prime[2].iter().sum();
        assert!(row.abs() < 1e-9);
    }

    #[test]
    fn test_b_double_prime_includes_charging() {
        let model = PowerFlowModel::from_network(&three_bus(90.0));
        let b_double_prime = build_b_double_prime(&model);
        let row: f64 = b_double_prime[0].iter().sum();
        // two lines leave bus 1, each with 0.01 p.u. of charging at this end
        assert!((row + 0.02).abs() < 1e-9);
        assert!(b_double_prime[0][1] < 0.0);
    }

    #[test]
    fn test_decoupled_converges() {
        let model = PowerFlowModel::from_network(&three_bus(60.0));
        let (mut v_mag, mut v_ang) = (model.v_set.clone(), vec![0.0; model.size]);
        v_mag[2] = 1.0;
        let outcome =
            fast_decoupled(&model, &PowerFlowOptions::default(), &mut v_mag, &mut v_ang);
        assert!(outcome.converged);
        assert!(outcome.max_mismatch < 1e-6);
    }
}
