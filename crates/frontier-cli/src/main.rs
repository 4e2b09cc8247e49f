mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::optimize::OptimizeArgs;
use commands::portfolio::{FrontierArgs, RiskMetricsArgs, UtilityArgs};

/// Mean-variance portfolio optimization
#[derive(Parser)]
#[command(
    name = "pfo",
    version,
    about = "Mean-variance portfolio optimization and efficient frontier analysis",
    long_about = "A CLI for long-only mean-variance portfolio optimization. Builds \
                  annualised return statistics from daily price history, solves the \
                  risk-aversion utility optimum, traces the efficient frontier and \
                  reports Sortino ratio and maximum drawdown."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a CSV of daily prices
    Optimize(OptimizeArgs),
    /// Maximize mean-variance utility from given moments
    Utility(UtilityArgs),
    /// Trace the efficient frontier from given moments
    Frontier(FrontierArgs),
    /// Sortino ratio and maximum drawdown of a return series
    RiskMetrics(RiskMetricsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("frontier_core=warn,frontier_cli=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Utility(args) => commands::portfolio::run_utility(args),
        Commands::Frontier(args) => commands::portfolio::run_frontier(args),
        Commands::RiskMetrics(args) => commands::portfolio::run_risk_metrics(args),
        Commands::Version => {
            println!("pfo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
