//! Calorically perfect ideal gas.

use crate::error::FluidResult;
use crate::wrapper::validation::{validate_enthalpy, validate_pressure, validate_temperature};
use crate::wrapper::{FluidBounds, FluidWrapper, GAS_CONSTANT};

/// Ideal gas with constant specific heat.
///
/// ```text
/// h(T)   = h_ref + cp (T - T_ref)
/// s(p,T) = cp ln(T / T_ref) - R_s ln(p / p_ref)
/// ρ(p,T) = p / (R_s T)
/// ```
#[derive(Clone, Debug)]
pub struct IdealGasWrapper {
    name: String,
    molar_mass: f64,
    cp: f64,
    t_ref: f64,
    h_ref: f64,
    p_ref: f64,
    viscosity: f64,
    bounds: FluidBounds,
}

impl IdealGasWrapper {
    /// `molar_mass` in kg/mol, `cp` in J/(kg·K).
    pub fn new(name: impl Into<String>, molar_mass: f64, cp: f64) -> Self {
        Self {
            name: name.into(),
            molar_mass,
            cp,
            t_ref: 298.15,
            h_ref: 0.0,
            p_ref: 101_325.0,
            viscosity: 1.8e-5,
            bounds: FluidBounds::new(1.0, 1e9, 50.0, 3000.0),
        }
    }

    pub fn nitrogen() -> Self {
        Self::new("N2", 0.028_013_4, 1040.0).with_viscosity(1.76e-5)
    }

    pub fn oxygen() -> Self {
        Self::new("O2", 0.031_998_8, 918.0).with_viscosity(2.04e-5)
    }

    pub fn air() -> Self {
        Self::new("air", 0.028_965, 1005.0)
    }

    pub fn carbon_dioxide() -> Self {
        Self::new("CO2", 0.044_009_5, 844.0).with_viscosity(1.47e-5)
    }

    pub fn argon() -> Self {
        Self::new("Ar", 0.039_948, 520.3).with_viscosity(2.23e-5)
    }

    /// Enthalpy `h_ref` is reached at temperature `t_ref`.
    pub fn with_reference(mut self, t_ref: f64, h_ref: f64) -> Self {
        self.t_ref = t_ref;
        self.h_ref = h_ref;
        self
    }

    pub fn with_bounds(mut self, bounds: FluidBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_viscosity(mut self, viscosity: f64) -> Self {
        self.viscosity = viscosity;
        self
    }

    /// Specific gas constant [J/(kg·K)].
    pub fn specific_gas_constant(&self) -> f64 {
        GAS_CONSTANT / self.molar_mass
    }

    pub fn cp(&self) -> f64 {
        self.cp
    }
}

impl FluidWrapper for IdealGasWrapper {
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
        validate_pressure(p)?;
        validate_enthalpy(h)?;
        let t = self.t_ref + (h - self.h_ref) / self.cp;
        validate_temperature(t)?;
        Ok(t)
    }

    fn h_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_pressure(p)?;
        validate_temperature(t)?;
        Ok(self.h_ref + self.cp * (t - self.t_ref))
    }

    fn d_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_pressure(p)?;
        validate_temperature(t)?;
        Ok(p / (self.specific_gas_constant() * t))
    }

    fn s_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_pressure(p)?;
        validate_temperature(t)?;
        Ok(self.cp * (t / self.t_ref).ln() - self.specific_gas_constant() * (p / self.p_ref).ln())
    }

    fn viscosity_pt(&self, p: f64, t: f64) -> FluidResult<f64> {
        validate_pressure(p)?;
        validate_temperature(t)?;
        Ok(self.viscosity)
    }

    fn h_ps(&self, p: f64, s: f64) -> FluidResult<f64> {
        validate_pressure(p)?;
        let r_s = self.specific_gas_constant();
        let t = self.t_ref * ((s + r_s * (p / self.p_ref).ln()) / self.cp).exp();
        self.h_pt(p, t)
    }

    fn dt_dh_p(&self, _p: f64, _h: f64) -> Option<FluidResult<f64>> {
        Some(Ok(1.0 / self.cp))
    }

    fn dt_dp_h(&self, _p: f64, _h: f64) -> Option<FluidResult<f64>> {
        Some(Ok(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FluidError;

    #[test]
    fn temperature_enthalpy_inverse() {
        let gas = IdealGasWrapper::nitrogen();
        let h = gas.h_pt(2e5, 412.0).unwrap();
        assert!((gas.t_ph(2e5, h).unwrap() - 412.0).abs() < 1e-10);
        assert!((h - 1040.0 * (412.0 - 298.15)).abs() < 1e-9);
    }

    #[test]
    fn isentropic_compression_matches_closed_form() {
        let gas = IdealGasWrapper::air();
        let h1 = gas.h_pt(1e5, 300.0).unwrap();
        let h2 = gas.isentropic(1e5, h1, 4e5).unwrap();
        let t2 = gas.t_ph(4e5, h2).unwrap();
        let exponent = gas.specific_gas_constant() / gas.cp();
        let expected = 300.0 * 4.0_f64.powf(exponent);
        assert!((t2 - expected).abs() < 1e-8, "t2={t2}, expected={expected}");
    }

    #[test]
    fn density_follows_ideal_gas_law() {
        let gas = IdealGasWrapper::nitrogen();
        let rho = gas.d_pt(101_325.0, 273.15).unwrap();
        assert!((rho - 1.2498).abs() < 1e-3, "rho={rho}");
    }

    #[test]
    fn saturation_queries_are_not_supported() {
        let gas = IdealGasWrapper::argon();
        assert!(matches!(
            gas.t_sat(1e5),
            Err(FluidError::NotSupported { .. })
        ));
    }

    #[test]
    fn negative_pressure_is_rejected() {
        let gas = IdealGasWrapper::oxygen();
        assert!(gas.h_pt(-5.0, 300.0).is_err());
        assert!(gas.t_ph(1e5, -1e9).is_err());
    }
}
