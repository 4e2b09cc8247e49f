use serde::{Deserialize, Serialize};

use crate::error::FrontierError;
use crate::types::{Rate, ReturnFrequency};
use crate::FrontierResult;

/// Annual risk-free rate used when the caller does not supply one.
pub const DEFAULT_RISK_FREE_RATE: Rate = 0.015;

/// Number of target returns sampled along the efficient frontier.
pub const DEFAULT_FRONTIER_POINTS: usize = 200;

/// Stopping rules for the active-set quadratic solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Hard cap on active-set iterations before reporting non-convergence.
    pub max_iterations: u32,
    /// Step-size and multiplier-sign tolerance.
    pub tolerance: f64,
    /// Maximum constraint residual accepted on a converged point.
    pub feasibility_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
            feasibility_tolerance: 1e-8,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> FrontierResult<()> {
        if self.max_iterations == 0 {
            return Err(FrontierError::invalid(
                "solver.max_iterations",
                "must be at least 1",
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(FrontierError::invalid(
                "solver.tolerance",
                "must be a positive finite number",
            ));
        }
        if !(self.feasibility_tolerance > 0.0 && self.feasibility_tolerance.is_finite()) {
            return Err(FrontierError::invalid(
                "solver.feasibility_tolerance",
                "must be a positive finite number",
            ));
        }
        Ok(())
    }
}

/// Knobs shared by every optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resampling frequency applied to daily prices before computing returns.
    pub frequency: ReturnFrequency,
    /// Annual risk-free rate.
    pub risk_free_rate: Rate,
    /// Requested efficient frontier grid size.
    pub frontier_points: usize,
    pub solver: SolverSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frequency: ReturnFrequency::Weekly,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            frontier_points: DEFAULT_FRONTIER_POINTS,
            solver: SolverSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> FrontierResult<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(FrontierError::invalid(
                "risk_free_rate",
                "must be a finite number",
            ));
        }
        if self.frontier_points == 0 {
            return Err(FrontierError::invalid(
                "frontier_points",
                "at least one frontier point is required",
            ));
        }
        self.solver.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.frequency, ReturnFrequency::Weekly);
        assert_eq!(cfg.risk_free_rate, 0.015);
        assert_eq!(cfg.frontier_points, 200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"frequency": "monthly", "solver": {"max_iterations": 50}}"#)
                .unwrap();
        assert_eq!(cfg.frequency, ReturnFrequency::Monthly);
        assert_eq!(cfg.frontier_points, DEFAULT_FRONTIER_POINTS);
        assert_eq!(cfg.solver.max_iterations, 50);
        assert_eq!(cfg.solver.tolerance, SolverSettings::default().tolerance);
    }

    #[test]
    fn test_zero_frontier_points_rejected() {
        let cfg = EngineConfig {
            frontier_points: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(FrontierError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_bad_solver_tolerance_rejected() {
        let settings = SolverSettings {
            tolerance: -1.0,
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
