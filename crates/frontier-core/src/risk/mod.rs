pub mod metrics;

pub use metrics::{
    calculate_risk_metrics, drawdown_series, max_drawdown, sortino_ratio, RiskMetricsInput,
    RiskMetricsOutput,
};
