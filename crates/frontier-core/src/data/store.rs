use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::FrontierResult;

/// A canonical daily price bar as held by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adj_close: Decimal,
    pub volume: i64,
}

impl PriceRow {
    /// Rows with a blank symbol or any negative price/volume are discarded at
    /// ingest.
    pub fn is_valid(&self) -> bool {
        !self.symbol.trim().is_empty()
            && [self.open, self.high, self.low, self.close, self.adj_close]
                .iter()
                .all(|p| *p >= Decimal::ZERO)
            && self.volume >= 0
    }
}

/// One `(date, symbol, adj_close)` triple returned by a price query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub symbol: String,
    pub adj_close: Decimal,
}

/// Query capability over stored prices.
///
/// Implementations return every point whose symbol is in `symbols` and whose
/// date lies in `[start, end]`, ordered by date.
pub trait PriceSource {
    fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> FrontierResult<Vec<PricePoint>>;
}

impl<F> PriceSource for F
where
    F: Fn(&[String], NaiveDate, NaiveDate) -> FrontierResult<Vec<PricePoint>>,
{
    fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> FrontierResult<Vec<PricePoint>> {
        self(symbols, start, end)
    }
}

/// Counts reported by [`InMemoryPriceStore::upsert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
}

/// Price store keyed by `(symbol, date)` with insert-or-update semantics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceStore {
    rows: BTreeMap<(String, NaiveDate), PriceRow>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows, replacing any stored row with the same `(symbol, date)`.
    pub fn upsert<I>(&mut self, rows: I) -> UpsertSummary
    where
        I: IntoIterator<Item = PriceRow>,
    {
        let mut summary = UpsertSummary::default();
        for row in rows {
            if !row.is_valid() {
                summary.rejected += 1;
                continue;
            }
            let key = (row.symbol.clone(), row.date);
            match self.rows.insert(key, row) {
                Some(_) => summary.updated += 1,
                None => summary.inserted += 1,
            }
        }
        if summary.rejected > 0 {
            warn!(rejected = summary.rejected, "discarded invalid price rows");
        }
        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            "price rows upserted"
        );
        summary
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, symbol: &str, date: NaiveDate) -> Option<&PriceRow> {
        self.rows.get(&(symbol.to_string(), date))
    }

    /// Distinct stored symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self.rows.keys().map(|(s, _)| s.clone()).collect();
        out.dedup();
        out
    }
}

impl PriceSource for InMemoryPriceStore {
    fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> FrontierResult<Vec<PricePoint>> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut points: Vec<PricePoint> = symbols
            .iter()
            .flat_map(|symbol| {
                self.rows
                    .range((symbol.clone(), start)..=(symbol.clone(), end))
                    .map(|(_, row)| PricePoint {
                        date: row.date,
                        symbol: row.symbol.clone(),
                        adj_close: row.adj_close,
                    })
            })
            .collect();
        points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        points.dedup();
        Ok(points)
    }
}
