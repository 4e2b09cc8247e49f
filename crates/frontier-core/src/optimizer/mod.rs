pub mod frontier;
pub mod linalg;
pub mod mean_variance;
mod qp;

pub use frontier::{
    compute_efficient_frontier, efficient_frontier, min_variance_for_target, target_return_grid,
    EfficientFrontier, FrontierInput, FrontierOutput, FrontierPoint,
};
pub use mean_variance::{
    max_utility, optimize_utility, portfolio_performance, sharpe_ratio, AssetWeight,
    UtilityInput, UtilityOutput,
};
