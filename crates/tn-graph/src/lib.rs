//! tn-graph: connection layer for thermonet.
//!
//! Provides:
//! - Property containers and per-substance mass fractions of a connection
//! - Typed and string-keyed attribute setting with over-specification checks
//! - References coupling properties of two connections
//! - Connection equations, bounds repair and result post-processing
//! - Column layout and equation ledger handed to the solver
//! - JSON-ready connection snapshots
//!
//! # Example
//!
//! ```
//! use tn_core::{CompId, UnitSystem};
//! use tn_fluids::{ClausiusClapeyronWrapper, FluidRegistry};
//! use tn_graph::{Connection, ConnectionAttr, ConnectionRegistry, Connector, PropKey, Reference};
//!
//! let fluids = FluidRegistry::new().with(ClausiusClapeyronWrapper::water());
//! let units = UnitSystem::default();
//! let mut conns = ConnectionRegistry::new();
//! let c1 = conns
//!     .insert(
//!         Connection::new(
//!             "c1",
//!             Connector::new(CompId::from_index(0), "out1"),
//!             Connector::new(CompId::from_index(1), "in1"),
//!             &units,
//!             &fluids,
//!             &["water"],
//!         )
//!         .unwrap(),
//!     )
//!     .unwrap();
//! let c2 = conns
//!     .insert(
//!         Connection::new(
//!             "c2",
//!             Connector::new(CompId::from_index(1), "out1"),
//!             Connector::new(CompId::from_index(2), "in1"),
//!             &units,
//!             &fluids,
//!             &["water"],
//!         )
//!         .unwrap(),
//!     )
//!     .unwrap();
//!
//! let half = Reference::new(c1, 0.5, 0.0).unwrap();
//! conns
//!     .set_attr(c2, [ConnectionAttr::property(PropKey::M, half)])
//!     .unwrap();
//! assert_eq!(conns.get(c2).unwrap().reference(PropKey::M), Some(&half));
//! ```

pub mod attrs;
pub mod bounds;
pub mod composition;
pub mod connection;
pub mod container;
pub mod equations;
pub mod error;
pub mod ledger;
pub mod reference;
pub mod registry;
pub mod results;
pub mod state;
pub mod validate;

pub use attrs::{AttrValue, ConnectionAttr, PhaseState, PropKey, Spec};
pub use bounds::{Adjusted, RangeAdjustment};
pub use composition::{FluidComposition, FluidFraction};
pub use connection::{ConnEquation, Connection, Connector, MASS_FLOW_LIMIT};
pub use container::PropertyContainer;
pub use error::{GraphError, GraphResult};
pub use ledger::{ColumnFilter, ColumnMap, ColumnTarget, ConnColumns, EquationLedger, SolveContext};
pub use reference::Reference;
pub use registry::ConnectionRegistry;
pub use results::PhysicalExergy;
pub use state::{ConnectionState, FluidState, PropertyState, ReferenceState};
pub use validate::{unconnected, validate_connectors};
