//! tn-fluids: fluid property provider for thermonet.
//!
//! Provides:
//! - the `FluidWrapper` trait every substance backend implements
//! - CoolProp backend for real fluids (feature `coolprop`)
//! - closed-form ideal gas and Clausius-Clapeyron substances
//! - an explicitly built `FluidRegistry`
//! - mixture functions and their partial derivatives
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tn_fluids::{FluidData, FluidRegistry, IdealGasWrapper, mixture};
//!
//! let registry = FluidRegistry::new().with(IdealGasWrapper::nitrogen());
//! let n2 = registry.get("N2").unwrap();
//! let data = FluidData::pure(Arc::clone(&n2));
//! let h = mixture::h_mix_pt(1e5, 350.0, &data).unwrap();
//! let t = mixture::t_mix_ph(1e5, h, &data, None).unwrap();
//! assert!((t - 350.0).abs() < 1e-9);
//! ```

#[cfg(feature = "coolprop")]
pub mod coolprop;
pub mod error;
pub mod ideal;
pub mod mixture;
pub mod registry;
pub mod species;
pub mod two_phase;
pub mod wrapper;

#[cfg(feature = "coolprop")]
pub use coolprop::CoolPropWrapper;
pub use error::{FluidError, FluidResult};
pub use ideal::IdealGasWrapper;
pub use mixture::{FluidData, FluidEntry, MixingRule};
pub use registry::FluidRegistry;
pub use species::Species;
pub use two_phase::ClausiusClapeyronWrapper;
pub use wrapper::{FluidBounds, FluidWrapper, GAS_CONSTANT};
