//! Linear coupling between same-kind properties of two connections.

use tn_core::ConnId;
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// `y = factor · y_ref + delta`, with `delta` in the unit of the property it
/// is attached to.
///
/// The target is an id resolved through the network's connection registry,
/// so a reference never keeps a connection alive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reference {
    target: ConnId,
    factor: f64,
    delta: f64,
}

impl Reference {
    pub fn new(target: ConnId, factor: f64, delta: f64) -> GraphResult<Self> {
        if !factor.is_finite() || !delta.is_finite() {
            return Err(GraphError::config(format!(
                "reference factor and delta must be finite numbers, got {factor} and {delta}"
            )));
        }
        debug!(%target, factor, delta, "created reference");
        Ok(Self {
            target,
            factor,
            delta,
        })
    }

    pub fn target(&self) -> ConnId {
        self.target
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Residual `y - (factor · y_ref + delta_si)`.
    pub fn residual(&self, y: f64, y_ref: f64, delta_si: f64) -> f64 {
        y - (self.factor * y_ref + delta_si)
    }
}
