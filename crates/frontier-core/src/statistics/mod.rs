pub mod moments;
pub mod returns;

pub use moments::{compute_return_statistics, validate_moments, ReturnStatistics};
pub use returns::{compute_period_returns, resample, ReturnSeries};
