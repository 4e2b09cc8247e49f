use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::PriceMatrix;
use crate::error::FrontierError;
use crate::types::ReturnFrequency;
use crate::FrontierResult;

/// Simple period returns per symbol, one row per resampled period.
///
/// `dates[t]` is the last trading date of period `t`; the first resampled
/// period has no predecessor and is not represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub symbols: Vec<String>,
    pub frequency: ReturnFrequency,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<Vec<f64>>,
}

impl ReturnSeries {
    pub fn num_periods(&self) -> usize {
        self.returns.len()
    }

    pub fn num_assets(&self) -> usize {
        self.symbols.len()
    }

    /// Return column for one asset index.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.returns.iter().map(|row| row[idx]).collect()
    }

    /// Realized per-period return of a fixed-weight portfolio.
    pub fn portfolio_returns(&self, weights: &[f64]) -> FrontierResult<Vec<f64>> {
        if weights.len() != self.num_assets() {
            return Err(FrontierError::invalid(
                "weights",
                format!(
                    "expected {} weights but got {}",
                    self.num_assets(),
                    weights.len()
                ),
            ));
        }
        Ok(self
            .returns
            .iter()
            .map(|row| row.iter().zip(weights).map(|(r, w)| r * w).sum())
            .collect())
    }
}

/// Keep the last price of every frequency bucket.
///
/// Buckets are derived from the calendar (see [`ReturnFrequency::bucket`]).
/// Because the input matrix is dense, every resampled row is dense too.
pub fn resample(matrix: &PriceMatrix, frequency: ReturnFrequency) -> (Vec<NaiveDate>, Vec<Vec<f64>>) {
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut last_bucket = None;

    for (date, row) in matrix.dates().iter().zip(matrix.rows()) {
        let bucket = frequency.bucket(*date);
        if last_bucket == Some(bucket) {
            // Later observation in the same bucket replaces the earlier one.
            if let (Some(d), Some(r)) = (dates.last_mut(), rows.last_mut()) {
                *d = *date;
                r.clone_from(row);
            }
        } else {
            dates.push(*date);
            rows.push(row.clone());
            last_bucket = Some(bucket);
        }
    }

    (dates, rows)
}

/// Resample prices and turn them into simple returns `p[t] / p[t-1] - 1`.
pub fn compute_period_returns(
    matrix: &PriceMatrix,
    frequency: ReturnFrequency,
) -> FrontierResult<ReturnSeries> {
    if matrix.is_empty() {
        return Err(FrontierError::EmptyData(
            "price matrix has no rows".into(),
        ));
    }

    let (dates, prices) = resample(matrix, frequency);
    if prices.len() < 2 {
        return Err(FrontierError::InsufficientHistory(format!(
            "{} {:?} price observation(s); at least 2 are required to form a return",
            prices.len(),
            frequency
        )));
    }

    let returns: Vec<Vec<f64>> = prices
        .windows(2)
        .map(|w| {
            w[1].iter()
                .zip(w[0].iter())
                .map(|(curr, prev)| curr / prev - 1.0)
                .collect()
        })
        .collect();

    Ok(ReturnSeries {
        symbols: matrix.symbols().to_vec(),
        frequency,
        dates: dates[1..].to_vec(),
        returns,
    })
}
