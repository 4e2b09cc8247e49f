//! Primal active-set solver for small convex quadratic programs
//!
//! ```text
//! minimize    ½ x'Hx + c'x
//! subject to  a_k'x = b_k      (equalities)
//!             lo <= x_i <= hi  (bounds)
//! ```
//!
//! Each iteration solves the equality-constrained subproblem on the null
//! space of the equalities plus the bounds in the working set, then either
//! steps toward its minimiser (adding the first bound that blocks) or, when
//! already there, releases the bound with the most negative multiplier.
//! `H` only needs to be positive semidefinite; flat directions are followed
//! to the nearest bound.

use tracing::trace;

use super::linalg::{dot, mat_vec, norm_inf, null_space, quad_form, rank, solve};
use crate::config::SolverSettings;
use crate::error::FrontierError;
use crate::FrontierResult;

/// Pivot tolerance used for rank and null-space decisions.
const RANK_TOL: f64 = 1e-10;

/// Reduced-Hessian entries this small relative to the largest are round-off.
const FLAT_CURVATURE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinearEquality {
    pub coefficients: Vec<f64>,
    pub rhs: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct QuadraticProgram {
    pub hessian: Vec<Vec<f64>>,
    pub linear: Vec<f64>,
    pub equalities: Vec<LinearEquality>,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct QpSolution {
    pub x: Vec<f64>,
    pub iterations: u32,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveBound {
    index: usize,
    side: Side,
}

impl QuadraticProgram {
    fn objective(&self, x: &[f64]) -> f64 {
        0.5 * quad_form(x, &self.hessian) + dot(&self.linear, x)
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        mat_vec(&self.hessian, x)
            .iter()
            .zip(self.linear.iter())
            .map(|(hx, c)| hx + c)
            .collect()
    }

    fn bound_value(&self, side: Side) -> f64 {
        match side {
            Side::Lower => self.lower,
            Side::Upper => self.upper,
        }
    }

    fn max_equality_residual(&self, x: &[f64]) -> f64 {
        self.equalities
            .iter()
            .map(|eq| (dot(&eq.coefficients, x) - eq.rhs).abs() / (1.0 + eq.rhs.abs()))
            .fold(0.0, f64::max)
    }
}

fn unit_row(n: usize, i: usize) -> Vec<f64> {
    let mut row = vec![0.0; n];
    row[i] = 1.0;
    row
}

fn constraint_rows(eq_rows: &[Vec<f64>], working: &[ActiveBound], n: usize) -> Vec<Vec<f64>> {
    eq_rows
        .iter()
        .cloned()
        .chain(working.iter().map(|b| unit_row(n, b.index)))
        .collect()
}

/// Solve `qp` starting from the feasible point `x0`.
///
/// `label` names the calling routine in convergence errors.
pub(crate) fn solve_qp(
    qp: &QuadraticProgram,
    x0: Vec<f64>,
    settings: &SolverSettings,
    label: &str,
) -> FrontierResult<QpSolution> {
    let n = x0.len();
    let failure = |iterations: u32, last_delta: f64| FrontierError::ConvergenceFailure {
        function: label.to_string(),
        iterations,
        last_delta,
    };

    if x0
        .iter()
        .any(|v| *v < qp.lower - settings.feasibility_tolerance || *v > qp.upper + settings.feasibility_tolerance)
        || qp.max_equality_residual(&x0) > settings.feasibility_tolerance
    {
        return Err(FrontierError::invalid(
            "initial_point",
            format!("{}: starting point violates the constraints", label),
        ));
    }

    // Redundant equalities are dropped; x0 already satisfies them.
    let mut eq_rows: Vec<Vec<f64>> = Vec::with_capacity(qp.equalities.len());
    for eq in &qp.equalities {
        let mut candidate = eq_rows.clone();
        candidate.push(eq.coefficients.clone());
        if rank(&candidate, n, RANK_TOL) > eq_rows.len() {
            eq_rows = candidate;
        }
    }

    let mut x = x0;
    let mut working: Vec<ActiveBound> = Vec::new();
    for i in 0..n {
        let side = if x[i] - qp.lower <= settings.feasibility_tolerance {
            Side::Lower
        } else if qp.upper - x[i] <= settings.feasibility_tolerance {
            Side::Upper
        } else {
            continue;
        };
        let mut candidate = constraint_rows(&eq_rows, &working, n);
        candidate.push(unit_row(n, i));
        if rank(&candidate, n, RANK_TOL) == candidate.len() {
            x[i] = qp.bound_value(side);
            working.push(ActiveBound { index: i, side });
        }
    }

    let mut last_delta = f64::INFINITY;
    for iteration in 1..=settings.max_iterations {
        let g = qp.gradient(&x);
        let rows = constraint_rows(&eq_rows, &working, n);
        let basis = null_space(&rows, n, RANK_TOL);

        let (p, ray) = if basis.is_empty() {
            (vec![0.0; n], false)
        } else {
            let (y, ray) = match reduced_step(&qp.hessian, &basis, &g, settings.tolerance) {
                Some(ReducedStep::Newton(y)) => (y, false),
                Some(ReducedStep::Ray(y)) => (y, true),
                None => return Err(failure(iteration, last_delta)),
            };
            let mut p = vec![0.0; n];
            for (yj, z) in y.iter().zip(basis.iter()) {
                for (pi, zi) in p.iter_mut().zip(z.iter()) {
                    *pi += yj * zi;
                }
            }
            for b in &working {
                p[b.index] = 0.0;
            }
            (p, ray)
        };
        last_delta = norm_inf(&p);

        if !ray && last_delta <= settings.tolerance {
            if working.is_empty() {
                return finish(qp, x, iteration, settings, &failure);
            }
            // Multipliers from C'λ = g in the least-squares sense.
            let cct: Vec<Vec<f64>> = rows
                .iter()
                .map(|ri| rows.iter().map(|rj| dot(ri, rj)).collect())
                .collect();
            let cg: Vec<f64> = rows.iter().map(|r| dot(r, &g)).collect();
            let lambda = solve(cct, cg).ok_or_else(|| failure(iteration, last_delta))?;

            let mult_tol = settings.tolerance * (1.0 + norm_inf(&g));
            let worst = working
                .iter()
                .enumerate()
                .map(|(k, b)| {
                    let l = lambda[eq_rows.len() + k];
                    let signed = match b.side {
                        Side::Lower => l,
                        Side::Upper => -l,
                    };
                    (k, signed)
                })
                .fold(None, |acc: Option<(usize, f64)>, cur| match acc {
                    Some(best) if best.1 <= cur.1 => Some(best),
                    _ => Some(cur),
                });

            match worst {
                Some((k, signed)) if signed < -mult_tol => {
                    let released = working.remove(k);
                    trace!(iteration, index = released.index, "released bound");
                }
                _ => return finish(qp, x, iteration, settings, &failure),
            }
        } else {
            // A ray has no minimiser of its own and runs until a bound blocks.
            let mut alpha = if ray { f64::INFINITY } else { 1.0 };
            let mut blocking: Option<ActiveBound> = None;
            for i in 0..n {
                if working.iter().any(|b| b.index == i) {
                    continue;
                }
                if p[i] < -settings.tolerance {
                    let step = (x[i] - qp.lower).max(0.0) / -p[i];
                    if step < alpha {
                        alpha = step;
                        blocking = Some(ActiveBound { index: i, side: Side::Lower });
                    }
                } else if p[i] > settings.tolerance {
                    let step = (qp.upper - x[i]).max(0.0) / p[i];
                    if step < alpha {
                        alpha = step;
                        blocking = Some(ActiveBound { index: i, side: Side::Upper });
                    }
                }
            }

            if !alpha.is_finite() {
                return Err(failure(iteration, last_delta));
            }
            for (xi, pi) in x.iter_mut().zip(p.iter()) {
                *xi += alpha * pi;
            }
            if let Some(b) = blocking {
                x[b.index] = qp.bound_value(b.side);
                working.push(b);
                trace!(iteration, index = b.index, alpha, "bound became active");
            }
            if x.iter().any(|v| !v.is_finite()) {
                return Err(failure(iteration, last_delta));
            }
        }
    }

    Err(failure(settings.max_iterations, last_delta))
}

/// Direction in null-space coordinates for one iteration.
enum ReducedStep {
    /// Minimiser of the reduced quadratic; a full step lands on it.
    Newton(Vec<f64>),
    /// Zero-curvature descent direction, scaled to unit max-norm.
    Ray(Vec<f64>),
}

/// Solve `Z'HZ y = -Z'g`.
///
/// A semidefinite `H` can leave `Z'HZ` singular. The objective is then flat
/// along the null space of `Z'HZ`: if the gradient slopes along it the step is
/// a ray down that slope, otherwise the system is consistent and the flat
/// component of `y` is pinned to zero.
fn reduced_step(
    hessian: &[Vec<f64>],
    basis: &[Vec<f64>],
    g: &[f64],
    tolerance: f64,
) -> Option<ReducedStep> {
    let hz: Vec<Vec<f64>> = basis.iter().map(|z| mat_vec(hessian, z)).collect();
    let reduced: Vec<Vec<f64>> = basis
        .iter()
        .map(|zi| hz.iter().map(|hzj| dot(zi, hzj)).collect())
        .collect();
    let rhs: Vec<f64> = basis.iter().map(|z| -dot(z, g)).collect();
    if let Some(y) = solve(reduced.clone(), rhs.clone()) {
        return Some(ReducedStep::Newton(y));
    }

    let m = rhs.len();
    let scale = reduced.iter().map(|row| norm_inf(row)).fold(0.0, f64::max);
    let cleaned: Vec<Vec<f64>> = reduced
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| if v.abs() <= scale * FLAT_CURVATURE { 0.0 } else { *v })
                .collect()
        })
        .collect();
    let flat = null_space(&cleaned, m, RANK_TOL);

    let mut descent = vec![0.0; m];
    for u in &flat {
        let slope = dot(u, &rhs);
        for (d, ui) in descent.iter_mut().zip(u.iter()) {
            *d += slope * ui;
        }
    }
    let size = norm_inf(&descent);
    if size > tolerance * (1.0 + norm_inf(&rhs)) {
        return Some(ReducedStep::Ray(descent.iter().map(|d| d / size).collect()));
    }

    // (R'R + UU') y = R'r with R symmetric and U spanning the flat directions.
    let normal: Vec<Vec<f64>> = (0..m)
        .map(|i| {
            (0..m)
                .map(|j| {
                    (0..m).map(|k| reduced[i][k] * reduced[k][j]).sum::<f64>()
                        + flat.iter().map(|u| u[i] * u[j]).sum::<f64>()
                })
                .collect()
        })
        .collect();
    solve(normal, mat_vec(&reduced, &rhs)).map(ReducedStep::Newton)
}

fn finish(
    qp: &QuadraticProgram,
    mut x: Vec<f64>,
    iterations: u32,
    settings: &SolverSettings,
    failure: &dyn Fn(u32, f64) -> FrontierError,
) -> FrontierResult<QpSolution> {
    for xi in x.iter_mut() {
        *xi = xi.clamp(qp.lower, qp.upper);
    }
    let residual = qp.max_equality_residual(&x);
    if residual > settings.feasibility_tolerance {
        return Err(failure(iterations, residual));
    }
    let objective = qp.objective(&x);
    Ok(QpSolution {
        x,
        iterations,
        objective,
    })
}
