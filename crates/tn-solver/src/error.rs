//! Error types for network solving.

use thiserror::Error;
use tn_components::ComponentError;
use tn_core::TnError;
use tn_fluids::FluidError;
use tn_graph::GraphError;

/// Errors that can occur while building or solving a network.
///
/// Running out of iterations is not an error; it is reported through
/// [`crate::SolveStatus::MaxIterations`].
#[derive(Error, Debug)]
pub enum SolverError {
    /// Unknown label, unconnected component, or a network whose equation
    /// count does not match its unknowns.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// Singular Jacobian or non-finite residuals during iteration.
    #[error("Numerical error at iteration {iteration}: {what}")]
    Numerical { iteration: usize, what: String },

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Fluid error: {0}")]
    Fluid(#[from] FluidError),

    #[error("Network state error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        SolverError::Configuration { what: what.into() }
    }

    /// Whether this error belongs to the configuration class, including
    /// configuration errors raised by lower layers.
    pub fn is_configuration(&self) -> bool {
        match self {
            SolverError::Configuration { .. } => true,
            SolverError::Component(ComponentError::Configuration { .. })
            | SolverError::Component(ComponentError::Unconnected { .. })
            | SolverError::Component(ComponentError::Graph(GraphError::Configuration { .. })) => {
                true
            }
            SolverError::Graph(e) => matches!(
                e,
                GraphError::Configuration { .. }
                    | GraphError::InvalidConnector { .. }
                    | GraphError::InvalidReference { .. }
                    | GraphError::UnknownLabel { .. }
            ),
            _ => false,
        }
    }
}

impl From<SolverError> for TnError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Configuration { .. } => TnError::InvalidArg {
                what: "network configuration",
            },
            SolverError::Numerical { .. } => TnError::InvalidArg { what: "numerical" },
            SolverError::Component(_) => TnError::InvalidArg { what: "component" },
            SolverError::Graph(_) => TnError::InvalidArg { what: "connection" },
            SolverError::Fluid(_) => TnError::InvalidArg { what: "fluid" },
            SolverError::Json(_) => TnError::InvalidArg {
                what: "network state",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_class_spans_layers() {
        assert!(SolverError::config("x").is_configuration());
        let graph: SolverError = GraphError::UnknownLabel { label: "c".into() }.into();
        assert!(graph.is_configuration());
        let numerical = SolverError::Numerical {
            iteration: 3,
            what: "singular".into(),
        };
        assert!(!numerical.is_configuration());
        assert!(numerical.to_string().contains("iteration 3"));
    }
}
