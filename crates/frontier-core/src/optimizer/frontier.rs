use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::mean_variance::{budget_constraint, portfolio_performance, sharpe_ratio, tidy_weights};
use super::qp::{solve_qp, LinearEquality, QuadraticProgram};
use crate::config::{SolverSettings, DEFAULT_FRONTIER_POINTS, DEFAULT_RISK_FREE_RATE};
use crate::error::FrontierError;
use crate::statistics::validate_moments;
use crate::types::{with_metadata, ComputationOutput, Rate, WeightVector};
use crate::FrontierResult;

/// Spread of mean returns below which every asset is treated as having the
/// same expected return.
const FLAT_SPREAD: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One solved sample of the efficient frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Annualised volatility of the minimum-variance portfolio.
    pub volatility: f64,
    /// Target return the point was solved for.
    pub target_return: f64,
    pub weights: WeightVector,
}

/// Efficient frontier ordered by increasing target return.
///
/// Grid points whose solve did not converge are left out of `points`;
/// `skipped_points` counts them so that `points.len() + skipped_points ==
/// requested_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficientFrontier {
    pub points: Vec<FrontierPoint>,
    pub requested_points: usize,
    pub skipped_points: usize,
}

impl EfficientFrontier {
    /// Index of the lowest-volatility point.
    pub fn min_volatility_index(&self) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.volatility.total_cmp(&b.1.volatility))
            .map(|(i, _)| i)
    }

    /// Index of the point with the highest Sharpe ratio against `risk_free_rate`.
    pub fn max_sharpe_index(&self, risk_free_rate: Rate) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, sharpe_ratio(p.target_return, risk_free_rate, p.volatility)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

/// Input for a standalone frontier computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierInput {
    pub asset_names: Vec<String>,
    pub expected_returns: Vec<f64>,
    pub covariance_matrix: Vec<Vec<f64>>,
    #[serde(default = "default_points")]
    pub num_points: usize,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default)]
    pub solver: SolverSettings,
}

fn default_points() -> usize {
    DEFAULT_FRONTIER_POINTS
}

fn default_risk_free_rate() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

/// Frontier plus its two notable portfolios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierOutput {
    pub asset_names: Vec<String>,
    pub frontier: EfficientFrontier,
    pub min_volatility: FrontierPoint,
    pub max_sharpe: FrontierPoint,
    pub max_sharpe_ratio: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn compute_efficient_frontier(
    input: &FrontierInput,
) -> FrontierResult<ComputationOutput<FrontierOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_moments(&input.expected_returns, &input.covariance_matrix)?;
    if input.asset_names.len() != input.expected_returns.len() {
        return Err(FrontierError::invalid(
            "asset_names",
            format!(
                "expected {} names but got {}",
                input.expected_returns.len(),
                input.asset_names.len()
            ),
        ));
    }

    let frontier = efficient_frontier(
        &input.expected_returns,
        &input.covariance_matrix,
        input.num_points,
        &input.solver,
    )?;

    if frontier.skipped_points > 0 {
        warnings.push(format!(
            "{} of {} frontier points did not converge and were omitted",
            frontier.skipped_points, frontier.requested_points
        ));
    }

    let (min_idx, sharpe_idx) = match (
        frontier.min_volatility_index(),
        frontier.max_sharpe_index(input.risk_free_rate),
    ) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(FrontierError::EmptyData("efficient frontier has no points".into())),
    };
    let min_volatility = frontier.points[min_idx].clone();
    let max_sharpe = frontier.points[sharpe_idx].clone();
    let max_sharpe_ratio = sharpe_ratio(
        max_sharpe.target_return,
        input.risk_free_rate,
        max_sharpe.volatility,
    );

    let output = FrontierOutput {
        asset_names: input.asset_names.clone(),
        frontier,
        min_volatility,
        max_sharpe,
        max_sharpe_ratio,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Efficient Frontier (minimum variance per target return, long-only)",
        &serde_json::json!({
            "n_assets": input.expected_returns.len(),
            "num_points": input.num_points,
            "risk_free_rate": input.risk_free_rate,
            "grid": "linear from min to max asset mean return",
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Target returns linearly spaced from the lowest to the highest mean return.
///
/// A single point grid is just the lowest mean return.
pub fn target_return_grid(mean_returns: &[f64], num_points: usize) -> Vec<f64> {
    let (lo, hi) = return_range(mean_returns);
    match num_points {
        0 => Vec::new(),
        1 => vec![lo],
        k => {
            let step = (hi - lo) / (k - 1) as f64;
            (0..k)
                .map(|i| if i == k - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}

/// Minimum-variance weights achieving `target_return` exactly.
pub fn min_variance_for_target(
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
    target_return: f64,
    settings: &SolverSettings,
) -> FrontierResult<WeightVector> {
    validate_moments(mean_returns, covariance)?;
    settings.validate()?;
    solve_target(mean_returns, covariance, target_return, settings)
}

/// Trace the efficient frontier over `num_points` target returns.
pub fn efficient_frontier(
    mean_returns: &[f64],
    covariance: &[Vec<f64>],
    num_points: usize,
    settings: &SolverSettings,
) -> FrontierResult<EfficientFrontier> {
    validate_moments(mean_returns, covariance)?;
    settings.validate()?;
    if num_points == 0 {
        return Err(FrontierError::invalid(
            "num_points",
            "at least one frontier point is required",
        ));
    }

    let grid = target_return_grid(mean_returns, num_points);

    #[cfg(feature = "parallel")]
    let solved: Vec<FrontierResult<Option<FrontierPoint>>> = grid
        .par_iter()
        .map(|&t| frontier_point(mean_returns, covariance, t, settings))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let solved: Vec<FrontierResult<Option<FrontierPoint>>> = grid
        .iter()
        .map(|&t| frontier_point(mean_returns, covariance, t, settings))
        .collect();

    let mut points = Vec::with_capacity(grid.len());
    for result in solved {
        if let Some(point) = result? {
            points.push(point);
        }
    }
    let skipped_points = grid.len() - points.len();

    if points.is_empty() {
        return Err(FrontierError::EmptyData(format!(
            "none of the {} frontier points converged",
            grid.len()
        )));
    }

    info!(
        requested = grid.len(),
        solved = points.len(),
        skipped = skipped_points,
        "traced efficient frontier"
    );
    Ok(EfficientFrontier {
        points,
        requested_points: grid.len(),
        skipped_points,
    })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn return_range(mean_returns: &[f64]) -> (f64, f64) {
    mean_returns
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| {
            (lo.min(m), hi.max(m))
        })
}

/// Solve one grid point; a convergence failure becomes `None`.
fn frontier_point(
    mu: &[f64],
    sigma: &[Vec<f64>],
    target: f64,
    settings: &SolverSettings,
) -> FrontierResult<Option<FrontierPoint>> {
    match solve_target(mu, sigma, target, settings) {
        Ok(weights) => {
            let (_, volatility) = portfolio_performance(&weights, mu, sigma)?;
            Ok(Some(FrontierPoint {
                volatility,
                target_return: target,
                weights,
            }))
        }
        Err(FrontierError::ConvergenceFailure {
            iterations,
            last_delta,
            ..
        }) => {
            warn!(
                target_return = target,
                iterations, last_delta, "frontier point skipped: solver did not converge"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn solve_target(
    mu: &[f64],
    sigma: &[Vec<f64>],
    target: f64,
    settings: &SolverSettings,
) -> FrontierResult<WeightVector> {
    let n = mu.len();
    let (lo, hi) = return_range(mu);
    let slack = settings.feasibility_tolerance * (1.0 + target.abs());
    if !target.is_finite() || target < lo - slack || target > hi + slack {
        return Err(FrontierError::invalid(
            "target_return",
            format!(
                "{} is outside the attainable range [{}, {}]",
                target, lo, hi
            ),
        ));
    }

    // At either end of the range only the assets sharing the extreme mean
    // can carry weight.
    if hi - lo > FLAT_SPREAD {
        let tie = slack.max(FLAT_SPREAD);
        if (target - lo).abs() <= tie {
            return solve_extreme(sigma, members_near(mu, lo, tie), settings);
        }
        if (target - hi).abs() <= tie {
            return solve_extreme(sigma, members_near(mu, hi, tie), settings);
        }
    }

    let qp = QuadraticProgram {
        hessian: scaled(sigma, 2.0),
        linear: vec![0.0; n],
        equalities: vec![
            budget_constraint(n),
            LinearEquality {
                coefficients: mu.to_vec(),
                rhs: target,
            },
        ],
        lower: 0.0,
        upper: 1.0,
    };

    let solution = solve_qp(&qp, feasible_start(mu, target), settings, "efficient_frontier")?;
    debug!(
        target_return = target,
        iterations = solution.iterations,
        "frontier point converged"
    );
    Ok(tidy_weights(solution.x))
}

fn scaled(sigma: &[Vec<f64>], factor: f64) -> Vec<Vec<f64>> {
    sigma
        .iter()
        .map(|row| row.iter().map(|c| factor * c).collect())
        .collect()
}

fn members_near(mu: &[f64], value: f64, tol: f64) -> Vec<usize> {
    mu.iter()
        .enumerate()
        .filter(|(_, m)| (*m - value).abs() <= tol)
        .map(|(i, _)| i)
        .collect()
}

/// Minimum variance over `members` only, every other weight zero.
fn solve_extreme(
    sigma: &[Vec<f64>],
    members: Vec<usize>,
    settings: &SolverSettings,
) -> FrontierResult<WeightVector> {
    let n = sigma.len();
    let mut weights = vec![0.0; n];
    if let [only] = members.as_slice() {
        weights[*only] = 1.0;
        return Ok(weights);
    }

    let m = members.len();
    let sub_sigma: Vec<Vec<f64>> = members
        .iter()
        .map(|&i| members.iter().map(|&j| sigma[i][j]).collect())
        .collect();
    let qp = QuadraticProgram {
        hessian: scaled(&sub_sigma, 2.0),
        linear: vec![0.0; m],
        equalities: vec![budget_constraint(m)],
        lower: 0.0,
        upper: 1.0,
    };
    let solution = solve_qp(&qp, vec![1.0 / m as f64; m], settings, "efficient_frontier")?;
    for (&i, w) in members.iter().zip(tidy_weights(solution.x)) {
        weights[i] = w;
    }
    Ok(weights)
}

/// Blend of the lowest- and highest-mean assets that hits `target` exactly.
fn feasible_start(mu: &[f64], target: f64) -> Vec<f64> {
    let n = mu.len();
    let (mut i_lo, mut i_hi) = (0, 0);
    for (i, &m) in mu.iter().enumerate() {
        if m < mu[i_lo] {
            i_lo = i;
        }
        if m > mu[i_hi] {
            i_hi = i;
        }
    }
    let spread = mu[i_hi] - mu[i_lo];
    if spread <= FLAT_SPREAD {
        return vec![1.0 / n as f64; n];
    }
    let lambda = ((target - mu[i_lo]) / spread).clamp(0.0, 1.0);
    let mut x = vec![0.0; n];
    x[i_lo] += 1.0 - lambda;
    x[i_hi] += lambda;
    x
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn three_asset() -> (Vec<f64>, Vec<Vec<f64>>) {
        (
            vec![0.05, 0.08, 0.12],
            vec![
                vec![0.0100, 0.0020, 0.0010],
                vec![0.0020, 0.0225, 0.0060],
                vec![0.0010, 0.0060, 0.0400],
            ],
        )
    }

    #[test]
    fn test_grid_endpoints() {
        let grid = target_return_grid(&[0.08, 0.05, 0.12], 5);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0], 0.05);
        assert_eq!(grid[4], 0.12);
        assert!((grid[2] - 0.085).abs() < 1e-15);
    }

    #[test]
    fn test_grid_single_point_is_min() {
        assert_eq!(target_return_grid(&[0.08, 0.05], 1), vec![0.05]);
    }

    #[test]
    fn test_feasible_start_hits_target() {
        let (mu, _) = three_asset();
        let x = feasible_start(&mu, 0.1);
        let ret: f64 = x.iter().zip(mu.iter()).map(|(w, m)| w * m).sum();
        assert!((ret - 0.1).abs() < 1e-15);
        assert!((x.iter().sum::<f64>() - 1.0).abs() < 1e-15);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn test_frontier_points_meet_targets() {
        let (mu, sigma) = three_asset();
        let f = efficient_frontier(&mu, &sigma, 25, &SolverSettings::default()).unwrap();
        assert_eq!(f.points.len() + f.skipped_points, 25);
        assert_eq!(f.skipped_points, 0);
        for p in &f.points {
            let sum: f64 = p.weights.iter().sum();
            let ret: f64 = p.weights.iter().zip(mu.iter()).map(|(w, m)| w * m).sum();
            assert!((sum - 1.0).abs() < 1e-8);
            assert!((ret - p.target_return).abs() < 1e-8);
            assert!(p.weights.iter().all(|w| *w >= 0.0 && *w <= 1.0));
        }
    }

    #[test]
    fn test_frontier_endpoints_are_single_assets() {
        let (mu, sigma) = three_asset();
        let f = efficient_frontier(&mu, &sigma, 10, &SolverSettings::default()).unwrap();
        let first = &f.points[0];
        let last = &f.points[f.points.len() - 1];
        assert_eq!(first.weights, vec![1.0, 0.0, 0.0]);
        assert_eq!(last.weights, vec![0.0, 0.0, 1.0]);
        assert!((last.volatility - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_target_out_of_range() {
        let (mu, sigma) = three_asset();
        let err = min_variance_for_target(&mu, &sigma, 0.2, &SolverSettings::default());
        assert!(matches!(err, Err(FrontierError::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_points_rejected() {
        let (mu, sigma) = three_asset();
        assert!(efficient_frontier(&mu, &sigma, 0, &SolverSettings::default()).is_err());
    }

    #[test]
    fn test_identical_means_collapse_to_gmv() {
        let mu = vec![0.07, 0.07];
        let sigma = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
        let f = efficient_frontier(&mu, &sigma, 3, &SolverSettings::default()).unwrap();
        for p in &f.points {
            // GMV for uncorrelated assets: w_i proportional to 1/σ²
            assert!((p.weights[0] - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_all_points_skipped_is_empty_data() {
        // Equal means start every solve from equal weights, which one
        // iteration cannot move to the optimum.
        let mu = vec![0.07, 0.07, 0.07];
        let sigma = vec![
            vec![0.04, 0.0, 0.0],
            vec![0.0, 0.01, 0.0],
            vec![0.0, 0.0, 0.02],
        ];
        let settings = SolverSettings {
            max_iterations: 1,
            ..SolverSettings::default()
        };
        let err = efficient_frontier(&mu, &sigma, 4, &settings).unwrap_err();
        assert!(matches!(err, FrontierError::EmptyData(_)));
    }

    #[test]
    fn test_tied_lowest_means_share_endpoint() {
        let mu = vec![0.05, 0.05, 0.12];
        let sigma = vec![
            vec![0.04, 0.0, 0.0],
            vec![0.0, 0.01, 0.0],
            vec![0.0, 0.0, 0.09],
        ];
        let w = min_variance_for_target(&mu, &sigma, 0.05, &SolverSettings::default()).unwrap();
        assert!((w[0] - 0.2).abs() < 1e-9);
        assert!((w[1] - 0.8).abs() < 1e-9);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn test_compute_efficient_frontier_summary() {
        let (mu, sigma) = three_asset();
        let input = FrontierInput {
            asset_names: vec!["Bonds".into(), "Credit".into(), "Equity".into()],
            expected_returns: mu,
            covariance_matrix: sigma,
            num_points: 40,
            risk_free_rate: 0.02,
            solver: SolverSettings::default(),
        };
        let out = compute_efficient_frontier(&input).unwrap();
        let r = &out.result;
        assert!(r.min_volatility.volatility <= r.max_sharpe.volatility + 1e-12);
        for p in &r.frontier.points {
            assert!(p.volatility >= r.min_volatility.volatility - 1e-12);
            assert!(sharpe_ratio(p.target_return, 0.02, p.volatility) <= r.max_sharpe_ratio + 1e-12);
        }
        assert!(out.warnings.is_empty());
    }
}
