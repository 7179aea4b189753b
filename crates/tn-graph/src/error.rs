//! Connection and container errors.

use thiserror::Error;
use tn_core::{ConnId, TnError};
use tn_fluids::FluidError;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Invalid keyword, wrong value type or an over-determined connection.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// A connector is unknown, reused, or connects a component to itself.
    #[error("Invalid connector: {what}")]
    InvalidConnector { what: String },

    #[error("Reference target {target} is not a registered connection")]
    InvalidReference { target: ConnId },

    #[error("Connection {id} not found")]
    UnknownConnection { id: ConnId },

    #[error("Connection label '{label}' not found")]
    UnknownLabel { label: String },

    #[error(transparent)]
    Core(#[from] TnError),

    #[error(transparent)]
    Fluid(#[from] FluidError),

    #[error("State dump error: {0}")]
    Serde(String),
}

impl GraphError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        GraphError::Configuration { what: what.into() }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serde(err.to_string())
    }
}
