use chrono::NaiveDate;
use frontier_core::data::PriceRow;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One CSV record. Only `symbol`, `date` and `adj_close` are required; missing
/// open/high/low/close fall back to the adjusted close and volume to zero.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    symbol: String,
    date: NaiveDate,
    #[serde(default)]
    open: Option<Decimal>,
    #[serde(default)]
    high: Option<Decimal>,
    #[serde(default)]
    low: Option<Decimal>,
    #[serde(default)]
    close: Option<Decimal>,
    adj_close: Decimal,
    #[serde(default)]
    volume: Option<i64>,
}

impl From<PriceRecord> for PriceRow {
    fn from(r: PriceRecord) -> Self {
        let adj = r.adj_close;
        PriceRow {
            symbol: r.symbol.trim().to_uppercase(),
            date: r.date,
            open: r.open.unwrap_or(adj),
            high: r.high.unwrap_or(adj),
            low: r.low.unwrap_or(adj),
            close: r.close.unwrap_or(adj),
            adj_close: adj,
            volume: r.volume.unwrap_or(0),
        }
    }
}

/// Read canonical price rows from CSV with a header line.
///
/// Dates use ISO format (`2024-06-28`).
pub fn load_price_rows_csv<R: Read>(reader: R) -> Result<Vec<PriceRow>, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<PriceRecord>().enumerate() {
        // Line 1 is the header.
        let record = record.map_err(|e| format!("CSV line {}: {}", i + 2, e))?;
        rows.push(PriceRow::from(record));
    }
    Ok(rows)
}
