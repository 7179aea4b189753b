//! tn-components: component library for thermonet networks.
//!
//! Provides:
//! - Sources and sinks bounding a network
//! - Valves (with an optional pressure drop characteristic), merges and
//!   splitters
//! - A simple heat exchanger against a constant ambient temperature
//! - Compressors, pumps and turbines with isentropic efficiency
//!
//! A component owns its parameters and the list of equations that are
//! active for the current solve. It reads the states of its connections
//! through a [`tn_graph::SolveContext`] and writes residuals and
//! derivatives into the shared [`tn_graph::EquationLedger`].
//!
//! # Example
//!
//! ```
//! use tn_components::{Component, ComponentAttr, ComponentKind, ParamKey, ParamSpec};
//!
//! let mut valve = Component::new("throttle", ComponentKind::Valve);
//! valve
//!     .set_attr([
//!         ComponentAttr::param(ParamKey::Pr, 0.5),
//!         ComponentAttr::Param(ParamKey::Zeta, ParamSpec::Free),
//!         ComponentAttr::Offdesign(vec![ParamKey::Zeta]),
//!     ])
//!     .unwrap();
//! assert_eq!(valve.value(ParamKey::Pr), 0.5);
//! assert_eq!(valve.inlet_ids(), vec!["in1"]);
//! ```

pub mod analysis;
pub mod characteristics;
pub mod common;
pub mod component;
pub mod equations;
pub mod error;
pub mod params;

pub use analysis::ExergyBalance;
pub use characteristics::{CharLine, CharParam, DpCharacteristic};
pub use component::{Component, ComponentAttr, ComponentKind, Side};
pub use equations::ComponentEquation;
pub use error::{ComponentError, ComponentResult};
pub use params::{ParamContainer, ParamKey, ParamSpec};
