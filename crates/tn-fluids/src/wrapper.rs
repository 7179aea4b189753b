//! Per-substance property interface and validation helpers.

use core::fmt;

use crate::error::{FluidError, FluidResult};

/// Universal gas constant [J/(mol·K)].
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Valid input window of a substance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidBounds {
    /// Minimum pressure [Pa]
    pub p_min: f64,
    /// Maximum pressure [Pa]
    pub p_max: f64,
    /// Minimum temperature [K]
    pub t_min: f64,
    /// Maximum temperature [K]
    pub t_max: f64,
    /// Critical pressure [Pa], `None` for substances without a phase change
    pub p_crit: Option<f64>,
    /// Critical temperature [K]
    pub t_crit: Option<f64>,
}

impl FluidBounds {
    pub fn new(p_min: f64, p_max: f64, t_min: f64, t_max: f64) -> Self {
        Self {
            p_min,
            p_max,
            t_min,
            t_max,
            p_crit: None,
            t_crit: None,
        }
    }

    pub fn with_critical_point(mut self, p_crit: f64, t_crit: f64) -> Self {
        self.p_crit = Some(p_crit);
        self.t_crit = Some(t_crit);
        self
    }
}

/// Property engine bound to a single substance.
///
/// All values are SI: pressure in Pa, temperature in K, specific enthalpy in
/// J/kg, specific entropy in J/(kg·K), density in kg/m³ and dynamic viscosity
/// in Pa·s. Implementations are called from a single thread but must be
/// shareable behind an `Arc` between connections.
pub trait FluidWrapper: Send + Sync + fmt::Debug {
    /// Registry key of the substance.
    fn name(&self) -> &str;

    /// Valid pressure and temperature window.
    fn bounds(&self) -> FluidBounds;

    /// Molar mass [kg/mol].
    fn molar_mass(&self) -> f64;

    fn t_ph(&self, p: f64, h: f64) -> FluidResult<f64>;

    fn h_pt(&self, p: f64, t: f64) -> FluidResult<f64>;

    fn d_pt(&self, p: f64, t: f64) -> FluidResult<f64>;

    fn s_pt(&self, p: f64, t: f64) -> FluidResult<f64>;

    fn viscosity_pt(&self, p: f64, t: f64) -> FluidResult<f64>;

    fn d_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.d_pt(p, self.t_ph(p, h)?)
    }

    fn s_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.s_pt(p, self.t_ph(p, h)?)
    }

    fn viscosity_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.viscosity_pt(p, self.t_ph(p, h)?)
    }

    /// Enthalpy at pressure and entropy, by bisection on temperature.
    fn h_ps(&self, p: f64, s: f64) -> FluidResult<f64> {
        const MAX_ITER: usize = 200;
        let bounds = self.bounds();
        let mut t_low = bounds.t_min;
        let mut t_high = bounds.t_max;
        let s_low = self.s_pt(p, t_low)?;
        let s_high = self.s_pt(p, t_high)?;
        if s < s_low || s > s_high {
            return Err(FluidError::OutOfRange {
                what: "entropy outside valid range for given pressure",
            });
        }
        for _ in 0..MAX_ITER {
            let t_mid = 0.5 * (t_low + t_high);
            let s_mid = self.s_pt(p, t_mid)?;
            if (s_mid - s).abs() <= 1e-9 * s.abs().max(1.0) {
                return self.h_pt(p, t_mid);
            }
            if s_mid < s {
                t_low = t_mid;
            } else {
                t_high = t_mid;
            }
        }
        self.h_pt(p, 0.5 * (t_low + t_high))
    }

    /// Outlet enthalpy of an isentropic change of state from (p1, h1) to p2.
    fn isentropic(&self, p1: f64, h1: f64, p2: f64) -> FluidResult<f64> {
        self.h_ps(p2, self.s_ph(p1, h1)?)
    }

    fn h_pq(&self, _p: f64, _q: f64) -> FluidResult<f64> {
        Err(FluidError::NotSupported {
            what: "saturation state of a substance without phase change",
        })
    }

    fn t_sat(&self, _p: f64) -> FluidResult<f64> {
        Err(FluidError::NotSupported {
            what: "saturation temperature of a substance without phase change",
        })
    }

    fn p_sat(&self, _t: f64) -> FluidResult<f64> {
        Err(FluidError::NotSupported {
            what: "saturation pressure of a substance without phase change",
        })
    }

    /// Vapour mass fraction; `-1` outside the two-phase region.
    fn q_ph(&self, _p: f64, _h: f64) -> FluidResult<f64> {
        Err(FluidError::NotSupported {
            what: "vapour fraction of a substance without phase change",
        })
    }

    /// Analytic ∂T/∂h at constant p, `None` requests a finite difference.
    fn dt_dh_p(&self, _p: f64, _h: f64) -> Option<FluidResult<f64>> {
        None
    }

    /// Analytic ∂T/∂p at constant h, `None` requests a finite difference.
    fn dt_dp_h(&self, _p: f64, _h: f64) -> Option<FluidResult<f64>> {
        None
    }
}

/// Validation helpers shared by the closed-form substances.
pub(crate) mod validation {
    use super::*;

    /// Ensure pressure is positive and finite.
    pub fn validate_pressure(p: f64) -> FluidResult<()> {
        if !p.is_finite() || p <= 0.0 {
            return Err(FluidError::NonPhysical {
                what: "pressure must be positive and finite",
            });
        }
        Ok(())
    }

    /// Ensure temperature is positive and finite.
    pub fn validate_temperature(t: f64) -> FluidResult<()> {
        if !t.is_finite() || t <= 0.0 {
            return Err(FluidError::NonPhysical {
                what: "temperature must be positive and finite",
            });
        }
        Ok(())
    }

    pub fn validate_enthalpy(h: f64) -> FluidResult<()> {
        if !h.is_finite() {
            return Err(FluidError::NonPhysical {
                what: "enthalpy must be finite",
            });
        }
        Ok(())
    }

    pub fn validate_quality(q: f64) -> FluidResult<()> {
        if !(0.0..=1.0).contains(&q) {
            return Err(FluidError::InvalidArg {
                what: "vapour fraction must lie in [0, 1]",
            });
        }
        Ok(())
    }
}
