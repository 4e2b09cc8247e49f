use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Portfolio weights aligned with the symbol order of the statistics they
/// were solved against.
pub type WeightVector = Vec<f64>;

/// Sampling frequency of a return series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFrequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> f64 {
        match self {
            ReturnFrequency::Daily => 252.0,
            ReturnFrequency::Weekly => 52.0,
            ReturnFrequency::Monthly => 12.0,
            ReturnFrequency::Quarterly => 4.0,
            ReturnFrequency::Annual => 1.0,
        }
    }

    /// Key of the resampling bucket a trading date falls into.
    ///
    /// Weekly buckets follow ISO weeks (Monday to Sunday), so a bucket's last
    /// observation is the last trading day on or before that Sunday.
    pub fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            ReturnFrequency::Daily => (date.year(), date.ordinal()),
            ReturnFrequency::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            ReturnFrequency::Monthly => (date.year(), date.month()),
            ReturnFrequency::Quarterly => (date.year(), (date.month() - 1) / 3 + 1),
            ReturnFrequency::Annual => (date.year(), 0),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(ReturnFrequency::Daily),
            "weekly" => Some(ReturnFrequency::Weekly),
            "monthly" => Some(ReturnFrequency::Monthly),
            "quarterly" => Some(ReturnFrequency::Quarterly),
            "annual" | "annually" => Some(ReturnFrequency::Annual),
            _ => None,
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "f64_ieee754".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekly_bucket_spans_monday_to_sunday() {
        let f = ReturnFrequency::Weekly;
        // 2024-06-03 is a Monday
        assert_eq!(f.bucket(d(2024, 6, 3)), f.bucket(d(2024, 6, 9)));
        assert_ne!(f.bucket(d(2024, 6, 9)), f.bucket(d(2024, 6, 10)));
    }

    #[test]
    fn test_weekly_bucket_across_year_end() {
        let f = ReturnFrequency::Weekly;
        // 2024-12-30 (Mon) and 2025-01-03 (Fri) share ISO week 1 of 2025
        assert_eq!(f.bucket(d(2024, 12, 30)), f.bucket(d(2025, 1, 3)));
    }

    #[test]
    fn test_quarter_bucket() {
        let f = ReturnFrequency::Quarterly;
        assert_eq!(f.bucket(d(2024, 1, 2)), (2024, 1));
        assert_eq!(f.bucket(d(2024, 6, 28)), (2024, 2));
        assert_eq!(f.bucket(d(2024, 12, 31)), (2024, 4));
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(ReturnFrequency::Weekly.periods_per_year(), 52.0);
        assert_eq!(ReturnFrequency::Daily.periods_per_year(), 252.0);
        assert_eq!(ReturnFrequency::default(), ReturnFrequency::Weekly);
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(ReturnFrequency::parse("Weekly"), Some(ReturnFrequency::Weekly));
        assert_eq!(ReturnFrequency::parse("annually"), Some(ReturnFrequency::Annual));
        assert_eq!(ReturnFrequency::parse("hourly"), None);
    }

    #[test]
    fn test_metadata_precision() {
        let out = with_metadata("m", &serde_json::json!({}), vec![], 7, 1.0);
        assert_eq!(out.metadata.precision, "f64_ieee754");
        assert_eq!(out.metadata.computation_time_us, 7);
    }
}
