use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::store::PriceSource;
use crate::error::FrontierError;
use crate::FrontierResult;

/// Date-aligned wide price table: one row per trading date, one column per
/// symbol. Every cell holds a positive, finite adjusted close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    prices: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Build a matrix from already-aligned rows.
    ///
    /// Dates must be strictly ascending and every row must carry one positive
    /// price per symbol.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        prices: Vec<Vec<f64>>,
    ) -> FrontierResult<Self> {
        if symbols.is_empty() {
            return Err(FrontierError::invalid(
                "symbols",
                "at least one symbol is required",
            ));
        }
        if dates.len() != prices.len() {
            return Err(FrontierError::invalid(
                "prices",
                format!("{} dates but {} price rows", dates.len(), prices.len()),
            ));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FrontierError::DateError(
                "price dates must be strictly ascending".into(),
            ));
        }
        for (row, date) in prices.iter().zip(dates.iter()) {
            if row.len() != symbols.len() {
                return Err(FrontierError::invalid(
                    "prices",
                    format!(
                        "row {} has {} prices, expected {}",
                        date,
                        row.len(),
                        symbols.len()
                    ),
                ));
            }
            if row.iter().any(|p| !(p.is_finite() && *p > 0.0)) {
                return Err(FrontierError::invalid(
                    "prices",
                    format!("row {} contains a non-positive price", date),
                ));
            }
        }
        Ok(Self {
            dates,
            symbols,
            prices,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Rows of prices, aligned with [`PriceMatrix::dates`].
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.prices
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Price column for one symbol.
    pub fn column(&self, symbol: &str) -> Option<Vec<f64>> {
        let idx = self.symbols.iter().position(|s| s == symbol)?;
        Some(self.prices.iter().map(|row| row[idx]).collect())
    }
}

/// Query the price source and pivot the result into a dense [`PriceMatrix`].
///
/// Columns follow the caller's symbol order (duplicates removed). Any date on
/// which at least one symbol lacks a usable price is dropped for all symbols.
pub fn assemble_price_matrix(
    source: &dyn PriceSource,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> FrontierResult<PriceMatrix> {
    let symbols = validate_request(symbols, start, end)?;

    let points = source.fetch_prices(&symbols, start, end)?;
    let fetched = points.len();

    let column_of: HashMap<&str, usize> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    // Wide pivot. A repeated (date, symbol) keeps the last value seen.
    let mut wide: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for point in &points {
        let Some(&col) = column_of.get(point.symbol.as_str()) else {
            continue;
        };
        let price = point.adj_close.to_f64().filter(|p| p.is_finite() && *p > 0.0);
        wide.entry(point.date)
            .or_insert_with(|| vec![None; symbols.len()])[col] = price;
    }

    let total_dates = wide.len();
    let mut dates = Vec::with_capacity(total_dates);
    let mut prices = Vec::with_capacity(total_dates);
    for (date, row) in wide {
        if let Some(dense) = row.into_iter().collect::<Option<Vec<f64>>>() {
            dates.push(date);
            prices.push(dense);
        }
    }

    if dates.is_empty() {
        return Err(FrontierError::EmptyData(format!(
            "no aligned prices for {} between {} and {} ({} points fetched)",
            symbols.join(","),
            start,
            end,
            fetched
        )));
    }

    let dropped = total_dates - dates.len();
    if dropped > 0 {
        debug!(dropped, "dates removed by strict alignment");
    }
    info!(
        symbols = symbols.len(),
        dates = dates.len(),
        dropped,
        "assembled price matrix"
    );

    PriceMatrix::new(dates, symbols, prices)
}

fn validate_request(
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> FrontierResult<Vec<String>> {
    if symbols.is_empty() {
        return Err(FrontierError::invalid(
            "symbols",
            "at least one symbol is required",
        ));
    }
    if let Some(blank) = symbols.iter().position(|s| s.trim().is_empty()) {
        return Err(FrontierError::invalid(
            format!("symbols[{}]", blank),
            "symbol must not be blank",
        ));
    }
    if start > end {
        return Err(FrontierError::invalid(
            "start_date",
            format!("start date {} is after end date {}", start, end),
        ));
    }

    let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
    for s in symbols {
        if !unique.contains(s) {
            unique.push(s.clone());
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::PricePoint;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn pt(day: u32, symbol: &str, price: Decimal) -> PricePoint {
        PricePoint {
            date: d(day),
            symbol: symbol.into(),
            adj_close: price,
        }
    }

    fn syms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pivot_drops_misaligned_dates() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Ok(vec![
                pt(2, "A", dec!(10)),
                pt(2, "B", dec!(20)),
                pt(3, "A", dec!(11)), // B missing on the 3rd
                pt(4, "A", dec!(12)),
                pt(4, "B", dec!(21)),
            ])
        };
        let m = assemble_price_matrix(&source, &syms(&["B", "A"]), d(1), d(31)).unwrap();
        assert_eq!(m.dates(), &[d(2), d(4)]);
        assert_eq!(m.symbols(), &syms(&["B", "A"])[..]);
        assert_eq!(m.rows(), &[vec![20.0, 10.0], vec![21.0, 12.0]]);
    }

    #[test]
    fn test_zero_price_treated_as_missing() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Ok(vec![pt(2, "A", dec!(0)), pt(3, "A", dec!(5))])
        };
        let m = assemble_price_matrix(&source, &syms(&["A"]), d(1), d(31)).unwrap();
        assert_eq!(m.dates(), &[d(3)]);
    }

    #[test]
    fn test_empty_result_is_empty_data() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Ok(vec![])
        };
        let err = assemble_price_matrix(&source, &syms(&["A"]), d(1), d(31)).unwrap_err();
        assert!(matches!(err, FrontierError::EmptyData(_)));
    }

    #[test]
    fn test_no_common_date_is_empty_data() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Ok(vec![pt(2, "A", dec!(1)), pt(3, "B", dec!(1))])
        };
        let err = assemble_price_matrix(&source, &syms(&["A", "B"]), d(1), d(31)).unwrap_err();
        assert!(matches!(err, FrontierError::EmptyData(_)));
    }

    #[test]
    fn test_start_after_end_rejected() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            panic!("source must not be queried")
        };
        let err = assemble_price_matrix(&source, &syms(&["A"]), d(5), d(1)).unwrap_err();
        assert!(matches!(err, FrontierError::InvalidInput { .. }));
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Ok(vec![])
        };
        assert!(matches!(
            assemble_price_matrix(&source, &[], d(1), d(5)),
            Err(FrontierError::InvalidInput { .. })
        ));
        assert!(matches!(
            assemble_price_matrix(&source, &syms(&[" "]), d(1), d(5)),
            Err(FrontierError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_source_error_propagates() {
        let source = |_: &[String], _: NaiveDate, _: NaiveDate| -> FrontierResult<Vec<PricePoint>> {
            Err(FrontierError::DataSource("connection refused".into()))
        };
        let err = assemble_price_matrix(&source, &syms(&["A"]), d(1), d(5)).unwrap_err();
        assert!(matches!(err, FrontierError::DataSource(_)));
    }

    #[test]
    fn test_matrix_rejects_unsorted_dates() {
        let err = PriceMatrix::new(
            vec![d(3), d(2)],
            syms(&["A"]),
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, FrontierError::DateError(_)));
    }

    #[test]
    fn test_matrix_rejects_non_positive_price() {
        assert!(PriceMatrix::new(vec![d(1)], syms(&["A"]), vec![vec![-1.0]]).is_err());
    }

    #[test]
    fn test_column_lookup() {
        let m = PriceMatrix::new(
            vec![d(1), d(2)],
            syms(&["A", "B"]),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(m.column("B"), Some(vec![2.0, 4.0]));
        assert_eq!(m.column("C"), None);
    }
}
