use chrono::NaiveDate;
use clap::Args;
use frontier_core::data::InMemoryPriceStore;
use frontier_core::pipeline::{run_optimization, OptimizationRequest};
use frontier_core::{EngineConfig, ReturnFrequency};
use serde_json::Value;
use tracing::info;

use crate::input;

/// Arguments for the full optimization pipeline
#[derive(Args)]
pub struct OptimizeArgs {
    /// CSV of daily prices (symbol,date,adj_close plus optional open,high,low,close,volume)
    #[arg(long)]
    pub prices: String,

    /// Comma-separated symbols (defaults to every symbol in the CSV)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// First date of the history window (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date of the history window (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Risk-aversion coefficient (e.g. 5)
    #[arg(long)]
    pub risk_aversion: f64,

    /// Engine configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Resampling frequency: daily, weekly, monthly, quarterly, annual
    #[arg(long)]
    pub frequency: Option<String>,

    /// Annual risk-free rate
    #[arg(long)]
    pub risk_free_rate: Option<f64>,

    /// Number of efficient frontier points
    #[arg(long)]
    pub frontier_points: Option<usize>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = engine_config(&args)?;

    let rows = input::csv_prices::load_price_rows_csv(input::file::open(&args.prices)?)?;
    let mut store = InMemoryPriceStore::new();
    let summary = store.upsert(rows);
    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        rejected = summary.rejected,
        "loaded price history"
    );
    if store.is_empty() {
        return Err(format!("No usable price rows in '{}'", args.prices).into());
    }

    let symbols = match args.symbols {
        Some(list) => list.iter().map(|s| s.trim().to_uppercase()).collect(),
        None => store.symbols(),
    };

    let request = OptimizationRequest {
        symbols,
        start_date: args.start.unwrap_or(NaiveDate::MIN),
        end_date: args.end.unwrap_or(NaiveDate::MAX),
        risk_aversion: args.risk_aversion,
        config,
    };

    let result = run_optimization(&store, &request)?;
    Ok(serde_json::to_value(result)?)
}

/// Config file first, then individual flags on top.
fn engine_config(args: &OptimizeArgs) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match args.config {
        Some(ref path) => input::file::read_engine_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(ref f) = args.frequency {
        config.frequency = ReturnFrequency::parse(f).ok_or_else(|| {
            format!(
                "Unknown frequency '{}'. Use: daily, weekly, monthly, quarterly, annual",
                f
            )
        })?;
    }
    if let Some(rf) = args.risk_free_rate {
        config.risk_free_rate = rf;
    }
    if let Some(points) = args.frontier_points {
        config.frontier_points = points;
    }
    config.validate()?;
    Ok(config)
}
