use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::DEFAULT_RISK_FREE_RATE;
use crate::error::FrontierError;
use crate::types::*;
use crate::FrontierResult;

/// Input for realized portfolio risk metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetricsInput {
    /// Periodic simple returns (as decimals)
    pub returns: Vec<f64>,
    /// Observation frequency
    #[serde(default)]
    pub frequency: ReturnFrequency,
    /// Annual risk-free rate
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
}

fn default_risk_free_rate() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

/// Output of realized portfolio risk metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetricsOutput {
    pub observations: usize,
    /// Mean period return times periods per year
    pub annualised_return: Rate,
    /// Sample standard deviation times sqrt(periods per year)
    pub annualised_volatility: Rate,
    /// Unbounded (serialized as null) when no period fell below the risk-free rate
    pub sortino_ratio: f64,
    /// Annualised downside deviation of excess returns
    pub downside_deviation: Rate,
    /// Largest peak-to-trough decline, as a non-positive fraction
    pub max_drawdown: Rate,
    /// Periods from the peak to the trough of the max drawdown
    pub max_drawdown_duration: u32,
}

/// Calculate Sortino ratio, drawdown and headline moments of a return series.
pub fn calculate_risk_metrics(
    input: &RiskMetricsInput,
) -> FrontierResult<ComputationOutput<RiskMetricsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let n = input.returns.len();
    if n == 0 {
        return Err(FrontierError::EmptyData("return series is empty".into()));
    }
    if input.returns.iter().any(|r| !r.is_finite() || *r <= -1.0) {
        return Err(FrontierError::invalid(
            "returns",
            "every return must be finite and greater than -100%",
        ));
    }
    if !input.risk_free_rate.is_finite() {
        return Err(FrontierError::invalid("risk_free_rate", "must be finite"));
    }

    let periods = input.frequency.periods_per_year();
    let mean = input.returns.iter().sum::<f64>() / n as f64;
    let annualised_return = mean * periods;

    let annualised_volatility = if n < 2 {
        warnings.push("Single observation: volatility reported as zero".into());
        0.0
    } else {
        let ss: f64 = input.returns.iter().map(|r| (r - mean) * (r - mean)).sum();
        (ss / (n - 1) as f64).sqrt() * periods.sqrt()
    };

    let sortino = sortino_ratio(&input.returns, input.risk_free_rate, input.frequency)?;
    if sortino.is_infinite() {
        warnings.push("No period returned less than the risk-free rate; Sortino ratio is unbounded".into());
    }
    let downside_deviation =
        downside_deviation(&input.returns, input.risk_free_rate, input.frequency) * periods.sqrt();

    let (max_drawdown, max_drawdown_duration) = max_drawdown_with_duration(&input.returns);

    let output = RiskMetricsOutput {
        observations: n,
        annualised_return,
        annualised_volatility,
        sortino_ratio: sortino,
        downside_deviation,
        max_drawdown,
        max_drawdown_duration,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Realized Risk Metrics (Sortino, Maximum Drawdown)",
        &serde_json::json!({
            "observations": n,
            "risk_free_rate": input.risk_free_rate,
            "frequency": format!("{:?}", input.frequency),
            "downside_threshold": "risk-free rate per period",
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Annualised Sortino ratio of periodic returns.
///
/// Excess returns are measured against `risk_free_rate / P`. The downside
/// deviation is the root-mean-square of the negative excess returns only, and
/// a series with none of them has an infinite ratio.
pub fn sortino_ratio(
    returns: &[f64],
    risk_free_rate: Rate,
    frequency: ReturnFrequency,
) -> FrontierResult<f64> {
    if returns.is_empty() {
        return Err(FrontierError::EmptyData(
            "Sortino ratio needs at least one return".into(),
        ));
    }
    let periods = frequency.periods_per_year();
    let dd = downside_deviation(returns, risk_free_rate, frequency);
    if dd == 0.0 {
        return Ok(f64::INFINITY);
    }
    let rf_period = risk_free_rate / periods;
    let mean_excess = returns.iter().map(|r| r - rf_period).sum::<f64>() / returns.len() as f64;
    Ok((mean_excess * periods) / (dd * periods.sqrt()))
}

/// Per-period downside deviation; zero when no excess return is negative.
fn downside_deviation(returns: &[f64], risk_free_rate: Rate, frequency: ReturnFrequency) -> f64 {
    let rf_period = risk_free_rate / frequency.periods_per_year();
    let (sum_sq, count) = returns
        .iter()
        .map(|r| r - rf_period)
        .filter(|e| *e < 0.0)
        .fold((0.0, 0usize), |(s, c), e| (s + e * e, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

/// Maximum drawdown of the wealth path compounded from `returns`.
///
/// The running peak starts at the first compounded value, so a loss in the
/// very first period is not a drawdown. Returns a value `<= 0`.
pub fn max_drawdown(returns: &[f64]) -> FrontierResult<Rate> {
    if returns.is_empty() {
        return Err(FrontierError::EmptyData(
            "maximum drawdown needs at least one return".into(),
        ));
    }
    Ok(max_drawdown_with_duration(returns).0)
}

/// Drawdown `(C - P) / P` at every period.
pub fn drawdown_series(returns: &[f64]) -> Vec<f64> {
    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    returns
        .iter()
        .map(|r| {
            cumulative *= 1.0 + r;
            peak = peak.max(cumulative);
            (cumulative - peak) / peak
        })
        .collect()
}

/// Maximum drawdown and its duration (in periods).
fn max_drawdown_with_duration(returns: &[f64]) -> (Rate, u32) {
    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0;
    let mut peak_idx: usize = 0;
    let mut max_dd_start: usize = 0;
    let mut max_dd_end: usize = 0;

    for (i, r) in returns.iter().enumerate() {
        cumulative *= 1.0 + r;
        if cumulative > peak {
            peak = cumulative;
            peak_idx = i;
        }
        let dd = (cumulative - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
            max_dd_start = peak_idx;
            max_dd_end = i;
        }
    }

    (max_dd, (max_dd_end - max_dd_start) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(returns: Vec<f64>) -> RiskMetricsInput {
        RiskMetricsInput {
            returns,
            frequency: ReturnFrequency::Weekly,
            risk_free_rate: 0.0,
        }
    }

    #[test]
    fn test_sortino_known_value() {
        // rf = 0: excess = returns; negatives are -0.01 and -0.03
        let returns = [0.02, -0.01, 0.04, -0.03];
        let dd = ((0.0001 + 0.0009) / 2.0_f64).sqrt();
        let expected = (0.005 * 52.0) / (dd * 52.0_f64.sqrt());
        let s = sortino_ratio(&returns, 0.0, ReturnFrequency::Weekly).unwrap();
        assert!((s - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sortino_uses_per_period_risk_free() {
        // Only 0.0005 falls below the weekly hurdle of 5.2% / 52 = 0.001
        let returns = [0.001, 0.0005, 0.003];
        let s = sortino_ratio(&returns, 0.052, ReturnFrequency::Weekly).unwrap();
        assert!(s.is_finite());
        assert!(s > 0.0);
    }

    #[test]
    fn test_sortino_all_above_rf_is_infinite() {
        let s = sortino_ratio(&[0.01, 0.02, 0.005], 0.015, ReturnFrequency::Weekly).unwrap();
        assert!(s.is_infinite() && s > 0.0);
    }

    #[test]
    fn test_sortino_empty() {
        assert!(matches!(
            sortino_ratio(&[], 0.0, ReturnFrequency::Weekly),
            Err(FrontierError::EmptyData(_))
        ));
    }

    #[test]
    fn test_max_drawdown_increasing_path() {
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.03]).unwrap(), 0.0);
    }

    #[test]
    fn test_max_drawdown_halve_then_recover() {
        let mdd = max_drawdown(&[0.1, -0.5, 1.0]).unwrap();
        assert!((mdd + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_first_period_loss_is_not_a_drawdown() {
        // Peak starts at the first compounded value
        assert_eq!(max_drawdown(&[-0.5, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_drawdown_series_matches_max() {
        let returns = [0.05, -0.10, 0.02, -0.20, 0.30];
        let series = drawdown_series(&returns);
        let min = series.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(series.len(), returns.len());
        assert_eq!(series[0], 0.0);
        assert!((min - max_drawdown(&returns).unwrap()).abs() < 1e-15);
        assert!(series.iter().all(|d| *d <= 0.0));
    }

    #[test]
    fn test_drawdown_duration() {
        let returns = [0.10, -0.05, -0.05, 0.02, 0.20];
        let (_, duration) = max_drawdown_with_duration(&returns);
        // Peak at index 0, trough at index 2
        assert_eq!(duration, 2);
    }

    #[test]
    fn test_calculate_risk_metrics() {
        let out = calculate_risk_metrics(&input(vec![0.02, -0.01, 0.04, -0.03, 0.01])).unwrap();
        let r = &out.result;
        assert_eq!(r.observations, 5);
        assert!((r.annualised_return - 0.006 * 52.0).abs() < 1e-12);
        assert!(r.annualised_volatility > 0.0);
        assert!(r.max_drawdown < 0.0);
        assert!(r.sortino_ratio.is_finite());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_unbounded_sortino_serializes_as_null() {
        let out = calculate_risk_metrics(&input(vec![0.01, 0.02])).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("unbounded")));
        let json = serde_json::to_value(&out.result).unwrap();
        assert!(json["sortino_ratio"].is_null());
    }

    #[test]
    fn test_rejects_total_loss() {
        assert!(calculate_risk_metrics(&input(vec![0.01, -1.0])).is_err());
    }

    #[test]
    fn test_empty_returns() {
        assert!(matches!(
            calculate_risk_metrics(&input(vec![])),
            Err(FrontierError::EmptyData(_))
        ));
    }
}
