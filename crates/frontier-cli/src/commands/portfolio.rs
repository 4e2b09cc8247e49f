use clap::Args;
use frontier_core::optimizer::{
    compute_efficient_frontier, optimize_utility, FrontierInput, UtilityInput,
};
use frontier_core::risk::{calculate_risk_metrics, RiskMetricsInput};
use frontier_core::ReturnFrequency;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::input;

/// Arguments for utility maximization from given moments
#[derive(Args)]
pub struct UtilityArgs {
    /// Path to JSON input (asset_names, expected_returns, covariance_matrix, risk_aversion)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the risk-aversion coefficient in the input
    #[arg(long)]
    pub risk_aversion: Option<f64>,
}

/// Arguments for efficient frontier tracing
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to JSON input (asset_names, expected_returns, covariance_matrix)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of frontier points
    #[arg(long)]
    pub points: Option<usize>,
}

/// Arguments for realized risk metrics
#[derive(Args)]
pub struct RiskMetricsArgs {
    /// Path to JSON input ({"returns": [...]} with optional frequency and risk_free_rate)
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns (e.g. "0.01,-0.02,0.015")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Annual risk-free rate
    #[arg(long, default_value = "0.015")]
    pub risk_free_rate: f64,

    /// Return frequency: daily, weekly, monthly, quarterly, annual
    #[arg(long, default_value = "weekly")]
    pub frequency: String,
}

pub fn run_utility(args: UtilityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut utility_input: UtilityInput = read_input(&args.input)?;
    if let Some(a) = args.risk_aversion {
        utility_input.risk_aversion = a;
    }
    let result = optimize_utility(&utility_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut frontier_input: FrontierInput = read_input(&args.input)?;
    if let Some(points) = args.points {
        frontier_input.num_points = points;
    }
    let result = compute_efficient_frontier(&frontier_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_risk_metrics(args: RiskMetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let risk_input: RiskMetricsInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(returns) = args.returns {
        RiskMetricsInput {
            returns,
            frequency: parse_frequency(&args.frequency)?,
            risk_free_rate: args.risk_free_rate,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("Provide --returns or --input file or pipe JSON via stdin".into());
    };

    let result = calculate_risk_metrics(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}

fn read_input<T: DeserializeOwned>(path: &Option<String>) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(ref p) = path {
        input::file::read_json(p)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(data)
    } else {
        Err("Provide --input file or pipe JSON via stdin".into())
    }
}

fn parse_frequency(s: &str) -> Result<ReturnFrequency, Box<dyn std::error::Error>> {
    ReturnFrequency::parse(s).ok_or_else(|| {
        format!(
            "Unknown frequency '{}'. Use: daily, weekly, monthly, quarterly, annual",
            s
        )
        .into()
    })
}
