//! Newton iteration settings, step damping and the solve report.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tn_core::ERR;
use tn_graph::RangeAdjustment;

/// Newton solver configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Iterations to run before convergence is accepted
    pub min_iterations: usize,
    /// Tolerance on the residual RMS
    pub tolerance: f64,
    /// Largest step per iteration as a fraction of a variable's valid range
    pub max_step_fraction: f64,
    /// Skip provider derivatives of composition columns that did not move
    pub increment_filter: bool,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            min_iterations: 1,
            tolerance: ERR,
            max_step_fraction: 0.5,
            increment_filter: true,
        }
    }
}

impl NewtonConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_min_iterations(mut self, n: usize) -> Self {
        self.min_iterations = n;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_step_fraction(mut self, frac: f64) -> Self {
        self.max_step_fraction = frac;
        self
    }

    pub fn with_increment_filter(mut self, on: bool) -> Self {
        self.increment_filter = on;
        self
    }
}

/// Outcome of a solve that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    /// The iteration cap was reached; the partial state stays inspectable.
    MaxIterations,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_rms: f64,
    /// Bounds-repair clamps applied between iterations.
    pub range_adjustments: Vec<RangeAdjustment>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Factor in `(0, 1]` so no increment exceeds `fraction` of its variable's
/// range. Columns with an infinite range do not limit the step.
pub fn damping_factor(dx: &DVector<f64>, ranges: &[f64], fraction: f64) -> f64 {
    dx.iter()
        .zip(ranges)
        .filter(|(d, r)| r.is_finite() && **d != 0.0)
        .map(|(d, r)| fraction * r / d.abs())
        .fold(1.0, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = NewtonConfig::default()
            .with_max_iterations(10)
            .with_tolerance(1e-8)
            .with_increment_filter(false);
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.min_iterations, 1);
        assert_eq!(cfg.tolerance, 1e-8);
        assert!(!cfg.increment_filter);
    }

    #[test]
    fn damping_limits_the_largest_relative_step() {
        let dx = DVector::from_vec(vec![0.8, 10.0, 1e9]);
        let ranges = [1.0, 100.0, f64::INFINITY];
        // 0.5 * 1 / 0.8
        assert!((damping_factor(&dx, &ranges, 0.5) - 0.625).abs() < 1e-12);

        let small = DVector::from_vec(vec![0.1, 1.0, 1e9]);
        assert_eq!(damping_factor(&small, &ranges, 0.5), 1.0);
    }
}
