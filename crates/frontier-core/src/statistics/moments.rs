use serde::{Deserialize, Serialize};
use tracing::debug;

use super::returns::{compute_period_returns, ReturnSeries};
use crate::data::PriceMatrix;
use crate::error::FrontierError;
use crate::types::ReturnFrequency;
use crate::FrontierResult;

/// Annualised first and second moments of a return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub symbols: Vec<String>,
    pub frequency: ReturnFrequency,
    /// Number of return periods the moments were estimated from.
    pub periods: usize,
    /// Column mean of period returns times periods per year.
    pub mean_returns: Vec<f64>,
    /// Sample covariance (n - 1 denominator) times periods per year.
    pub covariance: Vec<Vec<f64>>,
}

impl ReturnStatistics {
    /// Build statistics from externally estimated moments.
    pub fn new(
        symbols: Vec<String>,
        mean_returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        frequency: ReturnFrequency,
    ) -> FrontierResult<Self> {
        validate_moments(&mean_returns, &covariance)?;
        if symbols.len() != mean_returns.len() {
            return Err(FrontierError::invalid(
                "symbols",
                format!(
                    "expected {} symbols but got {}",
                    mean_returns.len(),
                    symbols.len()
                ),
            ));
        }
        Ok(Self {
            symbols,
            frequency,
            periods: 0,
            mean_returns,
            covariance,
        })
    }

    /// Estimate annualised moments from a period return series.
    pub fn from_returns(series: &ReturnSeries) -> FrontierResult<Self> {
        let t = series.num_periods();
        let n = series.num_assets();
        if t == 0 || n == 0 {
            return Err(FrontierError::EmptyData(
                "return series has no observations".into(),
            ));
        }
        if t < 2 {
            return Err(FrontierError::InsufficientHistory(format!(
                "{} return period(s); sample covariance needs at least 2",
                t
            )));
        }

        let scale = series.frequency.periods_per_year();
        let t_f = t as f64;

        let means: Vec<f64> = (0..n)
            .map(|j| series.returns.iter().map(|row| row[j]).sum::<f64>() / t_f)
            .collect();

        let mut covariance = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let sum: f64 = series
                    .returns
                    .iter()
                    .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                    .sum();
                let c = sum / (t_f - 1.0) * scale;
                covariance[i][j] = c;
                covariance[j][i] = c;
            }
        }

        let mean_returns = means.iter().map(|m| m * scale).collect();

        debug!(assets = n, periods = t, "estimated return moments");
        Ok(Self {
            symbols: series.symbols.clone(),
            frequency: series.frequency,
            periods: t,
            mean_returns,
            covariance,
        })
    }

    pub fn num_assets(&self) -> usize {
        self.mean_returns.len()
    }

    /// Annualised standalone volatility of each asset.
    pub fn asset_volatilities(&self) -> Vec<f64> {
        (0..self.num_assets())
            .map(|i| self.covariance[i][i].max(0.0).sqrt())
            .collect()
    }
}

/// Price matrix to annualised mean vector and covariance matrix.
pub fn compute_return_statistics(
    matrix: &PriceMatrix,
    frequency: ReturnFrequency,
) -> FrontierResult<ReturnStatistics> {
    let series = compute_period_returns(matrix, frequency)?;
    ReturnStatistics::from_returns(&series)
}

/// Check that a mean vector and covariance matrix describe the same assets.
pub fn validate_moments(mean_returns: &[f64], covariance: &[Vec<f64>]) -> FrontierResult<()> {
    let n = mean_returns.len();
    if n == 0 {
        return Err(FrontierError::invalid(
            "mean_returns",
            "at least one asset required",
        ));
    }
    if mean_returns.iter().any(|m| !m.is_finite()) {
        return Err(FrontierError::invalid(
            "mean_returns",
            "all expected returns must be finite",
        ));
    }
    if covariance.len() != n {
        return Err(FrontierError::invalid(
            "covariance_matrix",
            format!("expected {}x{} matrix but got {} rows", n, n, covariance.len()),
        ));
    }
    for (i, row) in covariance.iter().enumerate() {
        if row.len() != n {
            return Err(FrontierError::invalid(
                "covariance_matrix",
                format!("row {} has {} columns, expected {}", i, row.len(), n),
            ));
        }
        if row.iter().any(|c| !c.is_finite()) {
            return Err(FrontierError::invalid(
                "covariance_matrix",
                format!("row {} contains a non-finite value", i),
            ));
        }
    }
    for i in 0..n {
        if covariance[i][i] < 0.0 {
            return Err(FrontierError::invalid(
                "covariance_matrix",
                format!("negative variance on diagonal [{},{}]", i, i),
            ));
        }
        for j in (i + 1)..n {
            let tol = 1e-9 * (1.0 + covariance[i][j].abs().max(covariance[j][i].abs()));
            if (covariance[i][j] - covariance[j][i]).abs() > tol {
                return Err(FrontierError::invalid(
                    "covariance_matrix",
                    format!(
                        "not symmetric: [{},{}]={} != [{},{}]={}",
                        i, j, covariance[i][j], j, i, covariance[j][i]
                    ),
                ));
            }
        }
    }
    Ok(())
}
