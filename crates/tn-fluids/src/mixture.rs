//! Mixture property functions and their partial derivatives.
//!
//! A substance takes part in a mixture calculation once its mass fraction
//! exceeds [`ERR`]. With exactly one such substance every call is forwarded to
//! its wrapper; with several, properties are mixed according to the
//! [`MixingRule`]:
//!
//! - `Ideal`: each substance is evaluated at its partial pressure
//!   `p_i = x_i p` (molar fraction `x_i`), enthalpy and entropy are mass
//!   weighted and partial densities add up.
//! - `Incompressible`: each substance is evaluated at the mixture pressure and
//!   specific volumes are mass weighted.
//!
//! Temperature from (p, h) or (p, s) of a mixture is found by a safeguarded
//! Newton iteration inside the common temperature window of all present
//! substances.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use tn_core::{ERR, central_difference};

use crate::error::{FluidError, FluidResult};
use crate::wrapper::FluidWrapper;

/// Finite difference step for pressure derivatives [Pa].
pub const D_PRESSURE: f64 = 1e-1;
/// Finite difference step for enthalpy derivatives [J/kg].
pub const D_ENTHALPY: f64 = 1e-1;
/// Finite difference step for mass fraction derivatives.
pub const D_FRACTION: f64 = 1e-5;
/// Absolute enthalpy/entropy residual accepted by the temperature inversion.
pub const INVERSION_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MixingRule {
    #[default]
    Ideal,
    Incompressible,
}

impl MixingRule {
    pub fn key(self) -> &'static str {
        match self {
            MixingRule::Ideal => "ideal",
            MixingRule::Incompressible => "incompressible",
        }
    }
}

impl fmt::Display for MixingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MixingRule {
    type Err = FluidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ideal" | "ideal-cond" => Ok(MixingRule::Ideal),
            "incompressible" | "incomp" => Ok(MixingRule::Incompressible),
            _ => Err(FluidError::InvalidArg {
                what: "mixing rule must be 'ideal' or 'incompressible'",
            }),
        }
    }
}

/// One substance of a composition with its current mass fraction.
#[derive(Clone, Debug)]
pub struct FluidEntry {
    pub wrapper: Arc<dyn FluidWrapper>,
    pub mass_fraction: f64,
}

/// Substance handles plus mass fractions, rebuilt from a connection's
/// composition whenever fractions change.
#[derive(Clone, Debug)]
pub struct FluidData {
    entries: Vec<FluidEntry>,
    rule: MixingRule,
}

impl FluidData {
    pub fn new(entries: Vec<FluidEntry>, rule: MixingRule) -> Self {
        Self { entries, rule }
    }

    /// Single substance with mass fraction one.
    pub fn pure(wrapper: Arc<dyn FluidWrapper>) -> Self {
        Self::new(
            vec![FluidEntry {
                wrapper,
                mass_fraction: 1.0,
            }],
            MixingRule::Ideal,
        )
    }

    pub fn entries(&self) -> &[FluidEntry] {
        &self.entries
    }

    pub fn rule(&self) -> MixingRule {
        self.rule
    }

    /// Substances whose fraction exceeds `ERR`.
    pub fn present(&self) -> impl Iterator<Item = &FluidEntry> {
        self.entries.iter().filter(|e| e.mass_fraction > ERR)
    }

    pub fn number_of_fluids(&self) -> usize {
        self.present().count()
    }

    /// Wrapper of the only present substance, if the composition is pure.
    pub fn pure_wrapper(&self) -> Option<&Arc<dyn FluidWrapper>> {
        let mut present = self.present();
        match (present.next(), present.next()) {
            (Some(entry), None) => Some(&entry.wrapper),
            _ => None,
        }
    }

    /// Copy with the fraction of entry `index` replaced.
    pub fn with_fraction(&self, index: usize, mass_fraction: f64) -> Self {
        let mut copy = self.clone();
        if let Some(entry) = copy.entries.get_mut(index) {
            entry.mass_fraction = mass_fraction;
        }
        copy
    }

    /// Common temperature window of all present substances.
    pub fn temperature_window(&self) -> (f64, f64) {
        self.present().fold((f64::MIN, f64::MAX), |(lo, hi), e| {
            let b = e.wrapper.bounds();
            (lo.max(b.t_min), hi.min(b.t_max))
        })
    }

    /// Present substances with mass fraction and evaluation pressure.
    fn partial_states(&self, p: f64) -> FluidResult<Vec<(&FluidEntry, f64)>> {
        let present: Vec<&FluidEntry> = self.present().collect();
        if present.is_empty() {
            return Err(FluidError::InvalidArg {
                what: "composition has no substance with a non-zero fraction",
            });
        }
        match self.rule {
            MixingRule::Incompressible => Ok(present.into_iter().map(|e| (e, p)).collect()),
            MixingRule::Ideal => {
                let moles: Vec<f64> = present
                    .iter()
                    .map(|e| e.mass_fraction / e.wrapper.molar_mass())
                    .collect();
                let total: f64 = moles.iter().sum();
                Ok(present
                    .into_iter()
                    .zip(moles)
                    .map(|(e, n)| (e, p * n / total))
                    .collect())
            }
        }
    }

    fn require_pure(&self, what: &'static str) -> FluidResult<&Arc<dyn FluidWrapper>> {
        self.pure_wrapper()
            .ok_or(FluidError::NotSupported { what })
    }
}

pub fn h_mix_pt(p: f64, t: f64, data: &FluidData) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.h_pt(p, t);
    }
    data.partial_states(p)?
        .into_iter()
        .map(|(e, p_i)| Ok(e.mass_fraction * e.wrapper.h_pt(p_i, t)?))
        .sum()
}

pub fn s_mix_pt(p: f64, t: f64, data: &FluidData) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.s_pt(p, t);
    }
    data.partial_states(p)?
        .into_iter()
        .map(|(e, p_i)| Ok(e.mass_fraction * e.wrapper.s_pt(p_i, t)?))
        .sum()
}

/// Specific volume [m³/kg] at pressure and temperature.
pub fn v_mix_pt(p: f64, t: f64, data: &FluidData) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return Ok(1.0 / w.d_pt(p, t)?);
    }
    let states = data.partial_states(p)?;
    match data.rule {
        MixingRule::Ideal => {
            let rho: f64 = states
                .into_iter()
                .map(|(e, p_i)| e.wrapper.d_pt(p_i, t))
                .sum::<FluidResult<f64>>()?;
            Ok(1.0 / rho)
        }
        MixingRule::Incompressible => states
            .into_iter()
            .map(|(e, p_i)| Ok(e.mass_fraction / e.wrapper.d_pt(p_i, t)?))
            .sum(),
    }
}

/// Dynamic viscosity with Herning-Zipperer mixing.
pub fn viscosity_mix_pt(p: f64, t: f64, data: &FluidData) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.viscosity_pt(p, t);
    }
    let states = data.partial_states(p)?;
    let (mut num, mut den) = (0.0, 0.0);
    for (e, p_i) in states {
        let molar = e.mass_fraction / e.wrapper.molar_mass();
        let weight = molar * e.wrapper.molar_mass().sqrt();
        num += weight * e.wrapper.viscosity_pt(p_i, t)?;
        den += weight;
    }
    Ok(num / den)
}

pub fn t_mix_ph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.t_ph(p, h);
    }
    let (lo, hi) = data.temperature_window();
    invert_temperature(h, |t| h_mix_pt(p, t, data), lo, hi, t0, "mixture temperature from (p, h)")
}

pub fn t_mix_ps(p: f64, s: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.t_ph(p, w.h_ps(p, s)?);
    }
    let (lo, hi) = data.temperature_window();
    invert_temperature(s, |t| s_mix_pt(p, t, data), lo, hi, t0, "mixture temperature from (p, s)")
}

pub fn v_mix_ph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return Ok(1.0 / w.d_ph(p, h)?);
    }
    v_mix_pt(p, t_mix_ph(p, h, data, t0)?, data)
}

pub fn s_mix_ph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.s_ph(p, h);
    }
    s_mix_pt(p, t_mix_ph(p, h, data, t0)?, data)
}

pub fn viscosity_mix_ph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.viscosity_ph(p, h);
    }
    viscosity_mix_pt(p, t_mix_ph(p, h, data, t0)?, data)
}

/// Outlet enthalpy of an isentropic change of state from (p1, h1) to p2.
pub fn isentropic(p1: f64, h1: f64, p2: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(w) = data.pure_wrapper() {
        return w.isentropic(p1, h1, p2);
    }
    let s1 = s_mix_ph(p1, h1, data, t0)?;
    let t2 = t_mix_ps(p2, s1, data, t0)?;
    h_mix_pt(p2, t2, data)
}

pub fn h_mix_pq(p: f64, q: f64, data: &FluidData) -> FluidResult<f64> {
    data.require_pure("enthalpy from vapour fraction of a mixture")?
        .h_pq(p, q)
}

pub fn q_mix_ph(p: f64, h: f64, data: &FluidData) -> FluidResult<f64> {
    data.require_pure("vapour fraction of a mixture")?.q_ph(p, h)
}

pub fn t_sat_p(p: f64, data: &FluidData) -> FluidResult<f64> {
    data.require_pure("saturation temperature of a mixture")?
        .t_sat(p)
}

pub fn p_sat_t(t: f64, data: &FluidData) -> FluidResult<f64> {
    data.require_pure("saturation pressure of a mixture")?
        .p_sat(t)
}

/// ∂T/∂p at constant enthalpy and composition.
pub fn dt_mix_dph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(analytic) = data.pure_wrapper().and_then(|w| w.dt_dp_h(p, h)) {
        return analytic;
    }
    central_difference(|x| t_mix_ph(x, h, data, t0), p, D_PRESSURE)
}

/// ∂T/∂h at constant pressure and composition.
pub fn dt_mix_pdh(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    if let Some(analytic) = data.pure_wrapper().and_then(|w| w.dt_dh_p(p, h)) {
        return analytic;
    }
    central_difference(|x| t_mix_ph(p, x, data, t0), h, D_ENTHALPY)
}

/// ∂T/∂y_i at constant pressure and enthalpy for entry `index`.
pub fn dt_mix_ph_dfluid(
    p: f64,
    h: f64,
    data: &FluidData,
    index: usize,
    t0: Option<f64>,
) -> FluidResult<f64> {
    fraction_derivative(data, index, |d| t_mix_ph(p, h, d, t0))
}

pub fn dv_mix_dph(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    central_difference(|x| v_mix_ph(x, h, data, t0), p, D_PRESSURE)
}

pub fn dv_mix_pdh(p: f64, h: f64, data: &FluidData, t0: Option<f64>) -> FluidResult<f64> {
    central_difference(|x| v_mix_ph(p, x, data, t0), h, D_ENTHALPY)
}

pub fn dv_mix_ph_dfluid(
    p: f64,
    h: f64,
    data: &FluidData,
    index: usize,
    t0: Option<f64>,
) -> FluidResult<f64> {
    fraction_derivative(data, index, |d| v_mix_ph(p, h, d, t0))
}

/// ∂h/∂p along a line of constant vapour fraction.
pub fn dh_mix_dpq(p: f64, q: f64, data: &FluidData) -> FluidResult<f64> {
    central_difference(|x| h_mix_pq(x, q, data), p, D_PRESSURE)
}

pub fn dt_sat_dp(p: f64, data: &FluidData) -> FluidResult<f64> {
    central_difference(|x| t_sat_p(x, data), p, D_PRESSURE)
}

/// Central difference in one mass fraction, forward when the fraction is
/// closer to zero than the step.
fn fraction_derivative<F>(data: &FluidData, index: usize, mut f: F) -> FluidResult<f64>
where
    F: FnMut(&FluidData) -> FluidResult<f64>,
{
    let y = data
        .entries
        .get(index)
        .map(|e| e.mass_fraction)
        .ok_or(FluidError::InvalidArg {
            what: "fraction index outside composition",
        })?;
    let upper = f(&data.with_fraction(index, y + D_FRACTION))?;
    if y - D_FRACTION < 0.0 {
        let base = f(data)?;
        return Ok((upper - base) / D_FRACTION);
    }
    let lower = f(&data.with_fraction(index, y - D_FRACTION))?;
    Ok((upper - lower) / (2.0 * D_FRACTION))
}

/// Solve `f(T) = target` for a function increasing in T on `[lo, hi]`.
fn invert_temperature<F>(
    target: f64,
    f: F,
    lo: f64,
    hi: f64,
    t0: Option<f64>,
    what: &'static str,
) -> FluidResult<f64>
where
    F: Fn(f64) -> FluidResult<f64>,
{
    const MAX_ITER: usize = 100;
    const DT: f64 = 1e-2;

    if lo >= hi {
        return Err(FluidError::OutOfRange {
            what: "substances share no common temperature range",
        });
    }
    let (mut lo, mut hi) = (lo, hi);
    if f(lo)? > target || f(hi)? < target {
        return Err(FluidError::OutOfRange { what });
    }
    let (t_min, t_max) = (lo, hi);

    let mut t = t0
        .filter(|t| *t > lo && *t < hi)
        .unwrap_or_else(|| if 300.0 > lo && 300.0 < hi { 300.0 } else { 0.5 * (lo + hi) });
    for _ in 0..MAX_ITER {
        let residual = f(t)? - target;
        if residual.abs() <= INVERSION_TOLERANCE || hi - lo < 1e-10 {
            return Ok(t);
        }
        if residual > 0.0 {
            hi = t;
        } else {
            lo = t;
        }
        let step = if t + DT <= t_max { DT } else { -DT };
        let slope = (f(t + step)? - (residual + target)) / step;
        let mut next = t - residual / slope;
        if !next.is_finite() || next <= lo || next >= hi || next < t_min {
            next = 0.5 * (lo + hi);
        }
        t = next;
    }
    Err(FluidError::ConvergenceFailed { what })
}
