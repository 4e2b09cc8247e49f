use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::linalg::{dot, mat_vec, quad_form};
use super::qp::{solve_qp, LinearEquality, QuadraticProgram};
use crate::config::{SolverSettings, DEFAULT_RISK_FREE_RATE};
use crate::error::FrontierError;
use crate::statistics::validate_moments;
use crate::types::{with_metadata, ComputationOutput, Rate, WeightVector};
use crate::FrontierResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to risk-aversion utility maximization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityInput {
    /// Asset identifiers.
    pub asset_names: Vec<String>,
    /// Annualised expected returns per asset.
    pub expected_returns: Vec<f64>,
    /// N x N annualised covariance matrix.
    pub covariance_matrix: Vec<Vec<f64>>,
    /// Risk-aversion coefficient `a` in `E[R] - (a/2) Var(R)`.
    pub risk_aversion: f64,
    /// Annual risk-free rate, used for the Sharpe ratio only.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub solver: SolverSettings,
}

fn default_risk_free_rate() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

/// A single asset weight with risk/return contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub name: String,
    pub weight: f64,
    /// Weight times expected return.
    pub contribution_to_return: f64,
    /// Weight times marginal contribution to volatility.
    pub contribution_to_risk: f64,
}

/// Output of utility maximization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityOutput {
    /// Weights in input asset order.
    pub weights: Vec<AssetWeight>,
    pub expected_return: f64,
    pub volatility: f64,
    /// `(expected_return - rf) / volatility`.
    pub sharpe_ratio: f64,
    /// Achieved `E[R] - (a/2) Var(R)`.
    pub utility: f64,
    pub solver_iterations: u32,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Maximize mean-variance utility and report the resulting portfolio.
pub fn optimize_utility(input: &UtilityInput) -> FrontierResult<ComputationOutput<UtilityOutput>> {
    let start = Instant::now();

    let mu = &input.expected_returns;
    let sigma = &input.covariance_matrix;
    validate_moments(mu, sigma)?;
    if input.asset_names.len() != mu.len() {
        return Err(FrontierError::invalid(
            "asset_names",
            format!("expected {} names but got {}", mu.len(), input.asset_names.len()),
        ));
    }
    if !input.risk_free_rate.is_finite() {
        return Err(FrontierError::invalid("risk_free_rate", "must be finite"));
    }

    let (w, iterations) = solve_utility(mu, sigma, input.risk_aversion, &input.solver)?;
    let (expected_return, volatility) = portfolio_performance(&w, mu, sigma)?;
    let sharpe = sharpe_ratio(expected_return, input.risk_free_rate, volatility);
    let utility = expected_return - 0.5 * input.risk_aversion * volatility * volatility;

    let weights = asset_weights(&input.asset_names, &w, mu, sigma, volatility);

    let output = UtilityOutput {
        weights,
        expected_return,
        volatility,
        sharpe_ratio: sharpe,
        utility,
        solver_iterations: iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-Variance Utility Maximization (long-only, fully invested)",
        &serde_json::json!({
            "n_assets": mu.len(),
            "risk_aversion": input.risk_aversion,
            "risk_free_rate": input.risk_free_rate,
            "initial_guess": "equal weights",
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Weights maximizing `μ'w - (a/2) w'Σw` subject to `Σw = 1`, `0 <= w <= 1`.
///
/// The search starts from equal weights. A solver that fails to converge is
/// reported as [`FrontierError::ConvergenceFailure`]; no partial iterate is
/// ever returned.
pub fn max_utility(
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_aversion: f64,
    settings: &SolverSettings,
) -> FrontierResult<WeightVector> {
    validate_moments(mean_returns, covariance)?;
    solve_utility(mean_returns, covariance, risk_aversion, settings).map(|(w, _)| w)
}

/// Expected return `w'μ` and volatility `sqrt(w'Σw)` of a weight vector.
pub fn portfolio_performance(
    weights: &[f64],
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
) -> FrontierResult<(f64, f64)> {
    let n = weights.len();
    if mean_returns.len() != n {
        return Err(FrontierError::invalid(
            "mean_returns",
            format!("expected {} entries but got {}", n, mean_returns.len()),
        ));
    }
    if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
        return Err(FrontierError::invalid(
            "covariance_matrix",
            format!("expected a {}x{} matrix", n, n),
        ));
    }
    let expected_return = dot(weights, mean_returns);
    let variance = quad_form(weights, covariance);
    Ok((expected_return, variance.max(0.0).sqrt()))
}

/// Sharpe ratio with division-by-zero guard.
pub fn sharpe_ratio(expected_return: f64, risk_free_rate: Rate, volatility: f64) -> f64 {
    if volatility <= 0.0 {
        0.0
    } else {
        (expected_return - risk_free_rate) / volatility
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

pub(crate) fn solve_utility(
    mu: &[f64],
    sigma: &[Vec<f64>],
    risk_aversion: f64,
    settings: &SolverSettings,
) -> FrontierResult<(WeightVector, u32)> {
    if !(risk_aversion.is_finite() && risk_aversion > 0.0) {
        return Err(FrontierError::invalid(
            "risk_aversion",
            format!("must be a positive number, got {}", risk_aversion),
        ));
    }
    settings.validate()?;

    let n = mu.len();
    let qp = QuadraticProgram {
        hessian: sigma
            .iter()
            .map(|row| row.iter().map(|c| risk_aversion * c).collect())
            .collect(),
        linear: mu.iter().map(|m| -m).collect(),
        equalities: vec![budget_constraint(n)],
        lower: 0.0,
        upper: 1.0,
    };

    let solution = solve_qp(&qp, equal_weights(n), settings, "max_utility")?;
    debug!(
        iterations = solution.iterations,
        utility = -solution.objective,
        "utility maximization converged"
    );
    info!(risk_aversion, assets = n, "solved utility-maximizing portfolio");
    Ok((tidy_weights(solution.x), solution.iterations))
}

/// `Σw = 1`.
pub(crate) fn budget_constraint(n: usize) -> LinearEquality {
    LinearEquality {
        coefficients: vec![1.0; n],
        rhs: 1.0,
    }
}

/// Equal weights for n assets.
pub(crate) fn equal_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// Snap solver round-off onto the bounds.
pub(crate) fn tidy_weights(mut w: Vec<f64>) -> Vec<f64> {
    for wi in w.iter_mut() {
        if wi.abs() < 1e-12 {
            *wi = 0.0;
        } else if (*wi - 1.0).abs() < 1e-12 {
            *wi = 1.0;
        }
    }
    w
}

fn asset_weights(
    names: &[String],
    w: &[f64],
    mu: &[f64],
    sigma: &[Vec<f64>],
    volatility: f64,
) -> Vec<AssetWeight> {
    let sigma_w = mat_vec(sigma, w);
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mcr = if volatility > 0.0 {
                sigma_w[i] / volatility
            } else {
                0.0
            };
            AssetWeight {
                name: name.clone(),
                weight: w[i],
                contribution_to_return: w[i] * mu[i],
                contribution_to_risk: w[i] * mcr,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
