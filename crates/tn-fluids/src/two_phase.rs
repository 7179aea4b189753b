//! Two-phase substance with a Clausius-Clapeyron saturation curve.
//!
//! Liquid and vapour have constant specific heats, the latent heat is constant
//! and the liquid is incompressible. The model is thermodynamically crude but
//! fully closed-form, which keeps vapour fraction and sub-cooling
//! specifications testable without a native property library.

use crate::error::{FluidError, FluidResult};
use crate::wrapper::validation::{
    validate_enthalpy, validate_pressure, validate_quality, validate_temperature,
};
use crate::wrapper::{FluidBounds, FluidWrapper, GAS_CONSTANT};

#[derive(Clone, Debug)]
pub struct ClausiusClapeyronWrapper {
    name: String,
    molar_mass: f64,
    cp_liquid: f64,
    cp_vapour: f64,
    h_fg: f64,
    t_boil: f64,
    p_boil: f64,
    rho_liquid: f64,
    mu_liquid: f64,
    mu_vapour: f64,
    bounds: FluidBounds,
}

/// Where a (p, h) state sits relative to the saturation dome.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Region {
    Liquid,
    TwoPhase { q: f64 },
    Vapour,
}

impl ClausiusClapeyronWrapper {
    /// Water-like parameter set; enthalpy and entropy are zero for liquid at `t_min`.
    pub fn water() -> Self {
        Self {
            name: "water".to_string(),
            molar_mass: 0.018_015_268,
            cp_liquid: 4186.0,
            cp_vapour: 2080.0,
            h_fg: 2.257e6,
            t_boil: 373.124,
            p_boil: 101_325.0,
            rho_liquid: 958.0,
            mu_liquid: 2.8e-4,
            mu_vapour: 1.2e-5,
            bounds: FluidBounds::new(611.655, 1e8, 273.16, 1273.0)
                .with_critical_point(2.2064e7, 647.096),
        }
    }

    /// Build a custom substance. `molar_mass` in kg/mol, latent heat in J/kg,
    /// normal boiling point `(t_boil, p_boil)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        molar_mass: f64,
        cp_liquid: f64,
        cp_vapour: f64,
        h_fg: f64,
        t_boil: f64,
        p_boil: f64,
        rho_liquid: f64,
        bounds: FluidBounds,
    ) -> Self {
        Self {
            name: name.into(),
            molar_mass,
            cp_liquid,
            cp_vapour,
            h_fg,
            t_boil,
            p_boil,
            rho_liquid,
            mu_liquid: 1e-3,
            mu_vapour: 1e-5,
            bounds,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_viscosities(mut self, liquid: f64, vapour: f64) -> Self {
        self.mu_liquid = liquid;
        self.mu_vapour = vapour;
        self
    }

    fn r_s(&self) -> f64 {
        GAS_CONSTANT / self.molar_mass
    }

    fn t_zero(&self) -> f64 {
        self.bounds.t_min
    }

    fn check_subcritical(&self, p: f64) -> FluidResult<()> {
        validate_pressure(p)?;
        match self.bounds.p_crit {
            Some(p_crit) if p >= p_crit => Err(FluidError::OutOfRange {
                what: "pressure above critical pressure",
            }),
            _ => Ok(()),
        }
    }

    fn h_liquid(&self, t: f64) -> f64 {
        self.cp_liquid * (t - self.t_zero())
    }

    fn s_liquid(&self, t: f64) -> f64 {
        self.cp_liquid * (t / self.t_zero()).ln()
    }

    /// Saturated liquid and vapour enthalpy at `p`.
    fn h_sat(&self, p: f64) -> FluidResult<(f64, f64)> {
        let h_liq = self.h_liquid(self.t_sat(p)?);
        Ok((h_liq, h_liq + self.h_fg))
    }

    fn region(&self, p: f64, h: f64) -> FluidResult<(Region, f64)> {
        let t_sat = self.t_sat(p)?;
        let (h_liq, h_vap) = self.h_sat(p)?;
        let region = if h < h_liq {
            Region::Liquid
        } else if h > h_vap {
            Region::Vapour
        } else {
            Region::TwoPhase {
                q: (h - h_liq) / self.h_fg,
            }
        };
        Ok((region, t_sat))
    }

    /// dT_sat/dp from the Clausius-Clapeyron relation.
    fn dt_sat_dp(&self, p: f64) -> FluidResult<f64> {
        let t_sat = self.t_sat(p)?;
        Ok(t_sat * t_sat * self.r_s() / (self.h_fg * p))
    }
}

impl FluidWrapper for ClausiusClapeyronWrapper {
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
        validate_enthalpy(h)?;
        let (region, t_sat) = self.region(p, h)?;
        let t = match region {
            Region::Liquid => self.t_zero() + h / self.cp_liquid,
            Region::TwoPhase { .. } => t_sat,
            Region::Vapour => t_sat + (h - self.h_sat(p)?.1) / self.cp_vapour,
        };
        validate_temperature(t)?;
        Ok(t)
    }

    fn h_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        let t_sat = self.t_sat(p)?;
        if t < t_sat {
            Ok(self.h_liquid(t))
        } else {
            Ok(self.h_sat(p)?.1 + self.cp_vapour * (t - t_sat))
        }
    }

    fn d_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        if t < self.t_sat(p)? {
            Ok(self.rho_liquid)
        } else {
            Ok(p / (self.r_s() * t))
        }
    }

    fn d_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        let (region, t_sat) = self.region(p, h)?;
        match region {
            Region::Liquid => Ok(self.rho_liquid),
            Region::TwoPhase { q } => {
                let v = (1.0 - q) / self.rho_liquid + q * self.r_s() * t_sat / p;
                Ok(1.0 / v)
            }
            Region::Vapour => Ok(p / (self.r_s() * self.t_ph(p, h)?)),
        }
    }

    fn s_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        let t_sat = self.t_sat(p)?;
        if t < t_sat {
            Ok(self.s_liquid(t))
        } else {
            let s_vap = self.s_liquid(t_sat) + self.h_fg / t_sat;
            Ok(s_vap + self.cp_vapour * (t / t_sat).ln())
        }
    }

    fn s_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        let (region, t_sat) = self.region(p, h)?;
        match region {
            Region::TwoPhase { q } => Ok(self.s_liquid(t_sat) + q * self.h_fg / t_sat),
            _ => self.s_pt(p, self.t_ph(p, h)?),
        }
    }

    fn h_ps(&self, p: f64, s: f64) -> FluidResult<f64> {
        let t_sat = self.t_sat(p)?;
        let s_liq = self.s_liquid(t_sat);
        let s_vap = s_liq + self.h_fg / t_sat;
        let (h_liq, h_vap) = self.h_sat(p)?;
        if s < s_liq {
            let t = self.t_zero() * (s / self.cp_liquid).exp();
            Ok(self.h_liquid(t))
        } else if s > s_vap {
            let t = t_sat * ((s - s_vap) / self.cp_vapour).exp();
            Ok(h_vap + self.cp_vapour * (t - t_sat))
        } else {
            let q = (s - s_liq) * t_sat / self.h_fg;
            Ok(h_liq + q * self.h_fg)
        }
    }

    fn viscosity_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        if t < self.t_sat(p)? {
            Ok(self.mu_liquid)
        } else {
            Ok(self.mu_vapour)
        }
    }

    fn viscosity_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        match self.region(p, h)?.0 {
            Region::Liquid => Ok(self.mu_liquid),
            Region::TwoPhase { q } => Ok((1.0 - q) * self.mu_liquid + q * self.mu_vapour),
            Region::Vapour => Ok(self.mu_vapour),
        }
    }

    fn h_pq(&self, p: f64, q: f64) -> FluidResult<f64> {
        validate_quality(q)?;
        let (h_liq, _) = self.h_sat(p)?;
        Ok(h_liq + q * self.h_fg)
    }

    fn t_sat(&self, p: f64) -> FluidResult<f64> {
        self.check_subcritical(p)?;
        let inv = 1.0 / self.t_boil - self.r_s() / self.h_fg * (p / self.p_boil).ln();
        if inv <= 0.0 {
            return Err(FluidError::OutOfRange {
                what: "saturation temperature diverges at this pressure",
            });
        }
        Ok(1.0 / inv)
    }

    fn p_sat(&self, t: f64) -> FluidResult<f64> {
        validate_temperature(t)?;
        let p = self.p_boil * (self.h_fg / self.r_s() * (1.0 / self.t_boil - 1.0 / t)).exp();
        self.check_subcritical(p)?;
        Ok(p)
    }

    fn q_ph(&self, p: f64, h: f64) -> FluidResult<f64> {
        match self.region(p, h)?.0 {
            Region::TwoPhase { q } => Ok(q),
            _ => Ok(-1.0),
        }
    }

    fn dt_dh_p(&self, p: f64, h: f64) -> Option<FluidResult<f64>> {
        Some(self.region(p, h).map(|(region, _)| match region {
            Region::Liquid => 1.0 / self.cp_liquid,
            Region::TwoPhase { .. } => 0.0,
            Region::Vapour => 1.0 / self.cp_vapour,
        }))
    }

    fn dt_dp_h(&self, p: f64, h: f64) -> Option<FluidResult<f64>> {
        let derivative = || -> FluidResult<f64> {
            match self.region(p, h)?.0 {
                Region::Liquid => Ok(0.0),
                Region::TwoPhase { .. } => self.dt_sat_dp(p),
                Region::Vapour => {
                    Ok(self.dt_sat_dp(p)? * (1.0 - self.cp_liquid / self.cp_vapour))
                }
            }
        };
        Some(derivative())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_boiling_point_is_reproduced() {
        let water = ClausiusClapeyronWrapper::water();
        let t = water.t_sat(101_325.0).unwrap();
        assert!((t - 373.124).abs() < 1e-9);
        let p = water.p_sat(373.124).unwrap();
        assert!((p - 101_325.0).abs() < 1e-6);
    }

    #[test]
    fn saturation_temperature_at_five_bar_is_plausible() {
        let water = ClausiusClapeyronWrapper::water();
        let t = water.t_sat(5e5).unwrap();
        assert!((t - 425.0).abs() < 5.0, "t_sat(5 bar) = {t}");
    }

    #[test]
    fn enthalpy_temperature_inverse_in_single_phase() {
        let water = ClausiusClapeyronWrapper::water();
        for (p, t) in [(5e5, 320.0), (5e5, 500.0), (1e5, 390.0)] {
            let h = water.h_pt(p, t).unwrap();
            let back = water.t_ph(p, h).unwrap();
            assert!((back - t).abs() < 1e-9, "p={p}, t={t}, back={back}");
        }
    }

    #[test]
    fn vapour_fraction_spans_the_dome() {
        let water = ClausiusClapeyronWrapper::water();
        let p = 2e5;
        let h_liq = water.h_pq(p, 0.0).unwrap();
        let h_vap = water.h_pq(p, 1.0).unwrap();
        assert!((h_vap - h_liq - 2.257e6).abs() < 1e-6);
        let h_mid = 0.5 * (h_liq + h_vap);
        assert!((water.q_ph(p, h_mid).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(water.q_ph(p, h_liq - 1000.0).unwrap(), -1.0);
        assert_eq!(water.t_ph(p, h_mid).unwrap(), water.t_sat(p).unwrap());
    }

    #[test]
    fn entropy_enthalpy_inverse_across_regions() {
        let water = ClausiusClapeyronWrapper::water();
        let p = 3e5;
        let h_liq = water.h_pq(p, 0.0).unwrap();
        for h in [h_liq - 5e4, h_liq + 1e6, h_liq + 2.5e6] {
            let s = water.s_ph(p, h).unwrap();
            let back = water.h_ps(p, s).unwrap();
            assert!((back - h).abs() < 1e-6 * h.abs(), "h={h}, back={back}");
        }
    }

    #[test]
    fn analytic_temperature_derivatives_match_finite_differences() {
        let water = ClausiusClapeyronWrapper::water();
        let p = 4e5;
        let h = water.h_pt(p, 550.0).unwrap();
        let dp = 1.0;
        let fd = (water.t_ph(p + dp, h).unwrap() - water.t_ph(p - dp, h).unwrap()) / (2.0 * dp);
        let analytic = water.dt_dp_h(p, h).unwrap().unwrap();
        assert!((fd - analytic).abs() < 1e-6 * analytic.abs().max(1e-9), "fd={fd}, analytic={analytic}");

        let dh = water.dt_dh_p(p, h).unwrap().unwrap();
        assert!((dh - 1.0 / 2080.0).abs() < 1e-15);
    }

    #[test]
    fn supercritical_pressure_has_no_saturation_state() {
        let water = ClausiusClapeyronWrapper::water();
        assert!(water.t_sat(3e7).is_err());
        assert!(water.h_pq(3e7, 0.5).is_err());
    }
}
