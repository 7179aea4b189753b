//! Steady-state network solver for thermonet.
//!
//! A [`Network`] owns the components, the connections between them and the
//! buses summing their energy flows. Solving assembles one equation system
//! from every connection, component and bus, with mass flow, pressure,
//! enthalpy and the free mass fractions of every connection as unknowns
//! (plus component parameters marked as variable), and runs a damped
//! Newton iteration on it.
//!
//! A design run fixes the design quantities and records the converged
//! state as design point; offdesign runs then fix the offdesign quantities
//! at their design values and release the design ones.

pub mod bus;
pub mod error;
pub mod initialization;
pub mod jacobian;
pub mod mode;
pub mod network;
pub mod newton;
pub mod persistence;
pub mod solve;

pub use bus::{Bus, BusBase, BusEntry};
pub use error::{SolverError, SolverResult};
pub use mode::SolveMode;
pub use network::Network;
pub use newton::{NewtonConfig, SolveReport, SolveStatus, damping_factor};
pub use persistence::{BusState, ComponentState, NetworkState, ParamState};
