//! End-to-end run: stored prices to optimal allocation, realized risk and
//! the efficient frontier.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::EngineConfig;
use crate::data::{assemble_price_matrix, PriceSource};
use crate::optimizer::frontier::{efficient_frontier, EfficientFrontier};
use crate::optimizer::mean_variance::{portfolio_performance, sharpe_ratio, solve_utility};
use crate::risk::{max_drawdown, sortino_ratio};
use crate::statistics::{compute_period_returns, ReturnStatistics};
use crate::types::{with_metadata, ComputationOutput, Rate, WeightVector};
use crate::FrontierResult;

/// Everything needed for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub risk_aversion: f64,
    #[serde(default)]
    pub config: EngineConfig,
}

/// One line of the allocation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub symbol: String,
    pub weight: f64,
    /// Weight in percent, rounded to two decimals.
    pub weight_pct: f64,
}

/// A `(volatility, return)` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReturn {
    pub volatility: f64,
    pub expected_return: f64,
}

/// A single asset plotted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPoint {
    pub symbol: String,
    pub volatility: f64,
    pub expected_return: f64,
}

/// Plain numeric payload for drawing the frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierChart {
    pub frontier: Vec<RiskReturn>,
    pub assets: Vec<AssetPoint>,
    pub optimal: RiskReturn,
    pub risk_free_rate: Rate,
}

/// Result of [`run_optimization`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub symbols: Vec<String>,
    /// Optimal weights in `symbols` order.
    pub weights: WeightVector,
    /// Optimal weights, largest first.
    pub allocation: Vec<AllocationEntry>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Realized Sortino ratio of the optimal portfolio (null when unbounded).
    pub sortino_ratio: f64,
    /// Realized maximum drawdown of the optimal portfolio.
    pub max_drawdown: f64,
    /// Aligned trading dates used.
    pub price_dates: usize,
    pub statistics: ReturnStatistics,
    pub frontier: EfficientFrontier,
    pub chart: FrontierChart,
}

/// Assemble prices from `source`, estimate moments and solve.
pub fn run_optimization(
    source: &dyn PriceSource,
    request: &OptimizationRequest,
) -> FrontierResult<ComputationOutput<OptimizationReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let config = &request.config;
    config.validate()?;

    let matrix = assemble_price_matrix(
        source,
        &request.symbols,
        request.start_date,
        request.end_date,
    )?;
    let series = compute_period_returns(&matrix, config.frequency)?;
    let statistics = ReturnStatistics::from_returns(&series)?;
    let mu = &statistics.mean_returns;
    let sigma = &statistics.covariance;

    let (weights, iterations) =
        solve_utility(mu, sigma, request.risk_aversion, &config.solver)?;
    let (expected_return, volatility) = portfolio_performance(&weights, mu, sigma)?;
    let sharpe = sharpe_ratio(expected_return, config.risk_free_rate, volatility);

    let realized = series.portfolio_returns(&weights)?;
    let sortino = sortino_ratio(&realized, config.risk_free_rate, config.frequency)?;
    let mdd = max_drawdown(&realized)?;
    if sortino.is_infinite() {
        warnings.push("Optimal portfolio never returned less than the risk-free rate; Sortino ratio is unbounded".into());
    }

    let frontier = efficient_frontier(mu, sigma, config.frontier_points, &config.solver)?;
    if frontier.skipped_points > 0 {
        warnings.push(format!(
            "{} of {} frontier points did not converge and were omitted",
            frontier.skipped_points, frontier.requested_points
        ));
    }

    let symbols = statistics.symbols.clone();
    let mut allocation: Vec<AllocationEntry> = symbols
        .iter()
        .zip(weights.iter())
        .map(|(symbol, &weight)| AllocationEntry {
            symbol: symbol.clone(),
            weight,
            weight_pct: (weight * 10_000.0).round() / 100.0,
        })
        .collect();
    allocation.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let chart = FrontierChart {
        frontier: frontier
            .points
            .iter()
            .map(|p| RiskReturn {
                volatility: p.volatility,
                expected_return: p.target_return,
            })
            .collect(),
        assets: symbols
            .iter()
            .zip(mu.iter().zip(statistics.asset_volatilities()))
            .map(|(symbol, (&expected_return, volatility))| AssetPoint {
                symbol: symbol.clone(),
                volatility,
                expected_return,
            })
            .collect(),
        optimal: RiskReturn {
            volatility,
            expected_return,
        },
        risk_free_rate: config.risk_free_rate,
    };

    info!(
        assets = symbols.len(),
        periods = series.num_periods(),
        expected_return,
        volatility,
        "optimization run complete"
    );

    let report = OptimizationReport {
        symbols,
        weights,
        allocation,
        expected_return,
        volatility,
        sharpe_ratio: sharpe,
        sortino_ratio: sortino,
        max_drawdown: mdd,
        price_dates: matrix.num_dates(),
        statistics,
        frontier,
        chart,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-Variance Optimization (utility maximization and efficient frontier)",
        &serde_json::json!({
            "start_date": request.start_date,
            "end_date": request.end_date,
            "frequency": config.frequency,
            "risk_aversion": request.risk_aversion,
            "risk_free_rate": config.risk_free_rate,
            "frontier_points": config.frontier_points,
            "solver_iterations": iterations,
            "long_only": true,
        }),
        warnings,
        elapsed,
        report,
    ))
}
