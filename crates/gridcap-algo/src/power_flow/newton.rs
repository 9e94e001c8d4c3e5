//! # Full Newton-Raphson (FNSL)
//!
//! Each iteration linearizes the power-balance equations around the current
//! state and solves for the correction:
//!
//! ```text
//! J = [ ∂P/∂θ   ∂P/∂V ]      J × [Δθ, ΔV]ᵀ = [ΔP, ΔQ]ᵀ
//!     [ ∂Q/∂θ   ∂Q/∂V ]
//! ```
//!
//! Angles are unknown at every non-slack bus, magnitudes at PQ buses only.
//! The Jacobian is dense and factored with faer's partial-pivot LU.
//!
//! ## References
//!
//! - **Tinney & Hart (1967)**: "Power Flow Solution by Newton's Method"
//!   IEEE Trans. PAS, 86(11), 1449-1460.
//!   DOI: [10.1109/TPAS.1967.291823](https://doi.org/10.1109/TPAS.1967.291823)

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};

use super::{compute_power, equation_buses, max_mismatch, Iterations, PowerFlowModel};
use super::PowerFlowOptions;

pub(crate) fn newton_raphson(
    model: &PowerFlowModel,
    options: &PowerFlowOptions,
    v_mag: &mut [f64],
    v_ang: &mut [f64],
) -> Iterations {
    let (p_buses, q_buses) = equation_buses(model);
    let n_p = p_buses.len();
    let n_vars = n_p + q_buses.len();
    if n_vars == 0 {
        return Iterations {
            converged: true,
            iterations: 0,
            max_mismatch: 0.0,
        };
    }

    for iter in 0..options.max_iterations {
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

        let mut mismatch = Vec::with_capacity(n_vars);
        mismatch.extend(p_buses.iter().map(|&i| model.p_spec[i] - p_calc[i]));
        mismatch.extend(q_buses.iter().map(|&i| model.q_spec[i] - q_calc[i]));

        let jacobian = build_jacobian(model, v_mag, v_ang, &p_calc, &q_calc, &p_buses, &q_buses);
        let Some(delta) = solve_dense(&jacobian, &mismatch) else {
            break;
        };

        for (k, &i) in p_buses.iter().enumerate() {
            v_ang[i] += delta[k];
        }
        for (k, &i) in q_buses.iter().enumerate() {
            v_mag[i] += delta[n_p + k];
        }
    }

    let (p_calc, q_calc) = compute_power(model, v_mag, v_ang);
    let worst = max_mismatch(model, &p_buses, &q_buses, &p_calc, &q_calc);
    Iterations {
        converged: worst < options.tolerance,
        iterations: options.max_iterations,
        max_mismatch: worst,
    }
}

/// Dense Jacobian, rows `[P(p_buses), Q(q_buses)]`, columns `[θ(p_buses), V(q_buses)]`
fn build_jacobian(
    model: &PowerFlowModel,
    v_mag: &[f64],
    v_ang: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> Mat<f64> {
    let n_p = p_buses.len();
    let n_vars = n_p + q_buses.len();
    let mut jacobian = Mat::zeros(n_vars, n_vars);

    let rows = p_buses
        .iter()
        .map(|&i| (i, true))
        .chain(q_buses.iter().map(|&i| (i, false)));
    for (row, (i, is_p)) in rows.enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            let value = if is_p {
                dp_dtheta(model, v_mag, v_ang, q_calc, i, j)
            } else {
                dq_dtheta(model, v_mag, v_ang, p_calc, i, j)
            };
            jacobian.write(row, col, value);
        }
        for (col, &j) in q_buses.iter().enumerate() {
            let value = if is_p {
                dp_dv(model, v_mag, v_ang, p_calc, i, j)
            } else {
                dq_dv(model, v_mag, v_ang, q_calc, i, j)
            };
            jacobian.write(row, n_p + col, value);
        }
    }
    jacobian
}

/// ∂P_i/∂θ_j
fn dp_dtheta(model: &PowerFlowModel, v_mag: &[f64], v_ang: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let y = model.y_bus[i][j];
    if i == j {
        -q[i] - y.im * v_mag[i] * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * v_mag[j] * (y.re * sin - y.im * cos)
    }
}

/// ∂P_i/∂V_j
fn dp_dv(model: &PowerFlowModel, v_mag: &[f64], v_ang: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let y = model.y_bus[i][j];
    if i == j {
        p[i] / v_mag[i] + y.re * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * (y.re * cos + y.im * sin)
    }
}

/// ∂Q_i/∂θ_j
fn dq_dtheta(model: &PowerFlowModel, v_mag: &[f64], v_ang: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let y = model.y_bus[i][j];
    if i == j {
        p[i] - y.re * v_mag[i] * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        -v_mag[i] * v_mag[j] * (y.re * cos + y.im * sin)
    }
}

/// ∂Q_i/∂V_j
fn dq_dv(model: &PowerFlowModel, v_mag: &[f64], v_ang: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let y = model.y_bus[i][j];
    if i == j {
        q[i] / v_mag[i] - y.im * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * (y.re * sin - y.im * cos)
    }
}

/// Solve `a × x = b`; `None` when the matrix is singular.
pub(crate) fn solve_dense(a: &Mat<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut rhs = Mat::zeros(n, 1);
    for (i, &value) in b.iter().enumerate() {
        rhs.write(i, 0, value);
    }
    let lu = a.partial_piv_lu();
    let solution = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();
    x.iter().all(|v| v.is_finite()).then_some(x)
}
