//! CoolProp-based substance wrapper.

use crate::error::{FluidError, FluidResult};
use crate::species::Species;
use crate::wrapper::validation::{validate_pressure, validate_quality, validate_temperature};
use crate::wrapper::{FluidBounds, FluidWrapper};
use rfluids::prelude::*;

/// CoolProp backend bound to one pure substance.
///
/// Constants (molar mass, critical point, validity window) are read once at
/// construction so the solver never queries them lazily.
#[derive(Debug, Clone)]
pub struct CoolPropWrapper {
    name: String,
    species: Species,
    molar_mass: f64,
    bounds: FluidBounds,
}

fn backend<E: core::fmt::Display>(context: &str, e: E) -> FluidError {
    FluidError::Backend {
        message: format!("rfluids error {context}: {e}"),
    }
}

impl CoolPropWrapper {
    /// Bind the substance named `name` (registry key or CoolProp alias).
    pub fn new(name: &str) -> FluidResult<Self> {
        let species: Species = name.parse().map_err(|_| FluidError::UnknownFluid {
            name: name.to_string(),
        })?;
        let mut fluid = Fluid::from(species.rfluids_pure());
        let molar_mass = fluid
            .molar_mass()
            .unwrap_or_else(|_| species.molar_mass());
        let mut bounds = species.eos_bounds();
        if let (Ok(p_crit), Ok(t_crit)) = (fluid.critical_pressure(), fluid.critical_temperature())
        {
            bounds = bounds.with_critical_point(p_crit, t_crit);
        }
        Ok(Self {
            name: name.to_string(),
            species,
            molar_mass,
            bounds,
        })
    }

    pub fn species(&self) -> Species {
        self.species
    }

    fn pure(&self) -> Pure {
        self.species.rfluids_pure()
    }

    /// Create a Fluid instance at given P,T state.
    fn fluid_at_pt(&self, p: f64, t: f64) -> FluidResult<Fluid> {
        validate_pressure(p)?;
        validate_temperature(t)?;
        Fluid::from(self.pure())
            .in_state(FluidInput::pressure(p), FluidInput::temperature(t))
            .map_err(|e| backend(&format!("at P={p} Pa, T={t} K"), e))
    }

    fn fluid_at_ph(&self, p: f64, h: f64) -> FluidResult<Fluid> {
        validate_pressure(p)?;
        Fluid::from(self.pure())
            .in_state(FluidInput::pressure(p), FluidInput::enthalpy(h))
            .map_err(|e| backend(&format!("at P={p} Pa, h={h} J/kg"), e))
    }

    fn fluid_at_pq(&self, p: f64, q: f64) -> FluidResult<Fluid> {
        validate_pressure(p)?;
        validate_quality(q)?;
        Fluid::from(self.pure())
            .in_state(FluidInput::pressure(p), FluidInput::quality(q))
            .map_err(|e| backend(&format!("at P={p} Pa, Q={q}"), e))
    }

    fn is_subcritical(&self, p: f64) -> bool {
        self.bounds.p_crit.is_none_or(|p_crit| p < p_crit)
    }
}

impl FluidWrapper for CoolPropWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> FluidBounds {
        self.bounds
    }

    fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    fn t_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.fluid_at_ph(p, h)?
            .temperature()
            .map_err(|e| backend("getting temperature", e))
    }

    fn h_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        self.fluid_at_pt(p, t)?
            .enthalpy()
            .map_err(|e| backend("getting enthalpy", e))
    }

    fn d_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        self.fluid_at_pt(p, t)?
            .density()
            .map_err(|e| backend("getting density", e))
    }

    fn d_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.fluid_at_ph(p, h)?
            .density()
            .map_err(|e| backend("getting density", e))
    }

    fn s_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        self.fluid_at_pt(p, t)?
            .entropy()
            .map_err(|e| backend("getting entropy", e))
    }

    fn s_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.fluid_at_ph(p, h)?
            .entropy()
            .map_err(|e| backend("getting entropy", e))
    }

    fn viscosity_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        self.fluid_at_pt(p, t)?
            .dynamic_viscosity()
            .map_err(|e| backend("getting viscosity", e))
    }

    fn viscosity_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        self.fluid_at_ph(p, h)?
            .dynamic_viscosity()
            .map_err(|e| backend("getting viscosity", e))
    }

    /// Bisection on temperature outside the dome, lever rule inside it.
    fn h_ps(&self, p: f64, s: f64) -> FluidResult<f64> {
        if self.is_subcritical(p) {
            let mut liquid = self.fluid_at_pq(p, 0.0)?;
            let mut vapour = self.fluid_at_pq(p, 1.0)?;
            let s_liq = liquid.entropy().map_err(|e| backend("getting entropy", e))?;
            let s_vap = vapour.entropy().map_err(|e| backend("getting entropy", e))?;
            if (s_liq..=s_vap).contains(&s) {
                let h_liq = liquid.enthalpy().map_err(|e| backend("getting enthalpy", e))?;
                let h_vap = vapour.enthalpy().map_err(|e| backend("getting enthalpy", e))?;
                let q = (s - s_liq) / (s_vap - s_liq);
                return Ok(h_liq + q * (h_vap - h_liq));
            }
        }

        const MAX_ITER: usize = 100;
        let mut t_low = self.bounds.t_min * 1.001;
        let mut t_high = self.bounds.t_max;
        if self.s_pt(p, t_low)? > s || self.s_pt(p, t_high)? < s {
            return Err(FluidError::OutOfRange {
                what: "entropy outside valid range for given pressure",
            });
        }
        for _ in 0..MAX_ITER {
            let t_mid = 0.5 * (t_low + t_high);
            let s_mid = self.s_pt(p, t_mid)?;
            let tol = 1e-9 * s.abs().max(1.0);
            if (s_mid - s).abs() < tol {
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

    fn h_pq(&self, p: f64, q: f64) -> FluidResult<f64> {
        self.fluid_at_pq(p, q)?
            .enthalpy()
            .map_err(|e| backend("getting enthalpy", e))
    }

    fn t_sat(&self, p: f64) -> FluidResult<f64> {
        self.fluid_at_pq(p, 0.0)?
            .temperature()
            .map_err(|e| backend("getting saturation temperature", e))
    }

    fn p_sat(&self, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        Fluid::from(self.pure())
            .in_state(FluidInput::temperature(t), FluidInput::quality(0.0))
            .map_err(|e| backend(&format!("at T={t} K, Q=0"), e))?
            .pressure()
            .map_err(|e| backend("getting saturation pressure", e))
    }

    fn q_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        if !self.is_subcritical(p) {
            return Ok(-1.0);
        }
        let h_liq = self.h_pq(p, 0.0)?;
        let h_vap = self.h_pq(p, 1.0)?;
        if (h_liq..=h_vap).contains(&h) {
            Ok((h - h_liq) / (h_vap - h_liq))
        } else {
            Ok(-1.0)
        }
    }
}
