pub mod config;
pub mod data;
pub mod error;
pub mod optimizer;
pub mod pipeline;
pub mod risk;
pub mod statistics;
pub mod types;

pub use config::{EngineConfig, SolverSettings};
pub use error::FrontierError;
pub use types::*;

/// Standard result type for all frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;
