//! tn-core: stable foundation for thermonet.
//!
//! Contains:
//! - units (uom-backed conversion between user units and SI)
//! - numeric (Real, convergence constant, residual norm, finite differences)
//! - ids (compact IDs for connections, components and buses)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{TnError, TnResult};
pub use ids::*;
pub use numeric::*;
pub use units::{PropertyKind, Unit, UnitSystem};
