//! Error types for component operations.

use thiserror::Error;
use tn_fluids::FluidError;
use tn_graph::GraphError;

/// Errors that can occur while configuring or evaluating a component.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    /// Unknown parameter, parameter not offered by this component kind, or
    /// an invalid value.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Component '{component}' has no connection at '{connector}'")]
    Unconnected { component: String, connector: String },

    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Fluid(#[from] FluidError),
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl ComponentError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        ComponentError::Configuration { what: what.into() }
    }
}
