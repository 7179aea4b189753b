//! Bounds repair between Newton iterations.
//!
//! Free pressure and enthalpy values are pulled back into the validity range
//! of the present substances before the next round of property calls. Every
//! clamp is logged and returned; nothing here fails.

use std::sync::Arc;

use tn_core::ERR;
use tn_fluids::{FluidWrapper, mixture};
use tracing::debug;

use crate::attrs::{PhaseState, PropKey};
use crate::connection::Connection;

/// Quantity moved by a bounds repair.
#[derive(Clone, Debug, PartialEq)]
pub enum Adjusted {
    Property(PropKey),
    Fraction(String),
}

/// One clamp performed by the bounds repair.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeAdjustment {
    pub connection: String,
    pub quantity: Adjusted,
    pub from: f64,
    pub to: f64,
}

impl Connection {
    /// Clamp free variables into the range of the present substances.
    pub fn check_bounds(&mut self) -> Vec<RangeAdjustment> {
        let mut log = Vec::new();
        let data = self.fluid_data();
        let pure = data.pure_wrapper().cloned();

        match pure {
            Some(w) => {
                if self.p.is_unknown() {
                    self.check_pressure_bounds(&w, &mut log);
                }
                if self.h.is_unknown() {
                    self.check_enthalpy_bounds(&w, &mut log);
                    let two_phase = self.td_bp.is_set || self.state.is_some();
                    let subcritical = w
                        .bounds()
                        .p_crit
                        .is_none_or(|p_crit| self.p.val_si < p_crit);
                    if two_phase && subcritical {
                        self.check_two_phase_bounds(&w, &mut log);
                    }
                }
            }
            None if data.number_of_fluids() > 1 && self.h.is_unknown() => {
                self.check_temperature_bounds(&mut log);
            }
            None => {}
        }

        if self.m.is_unknown() && self.m.val_si.is_finite() {
            let clamped = self.m.clamp_to_range(self.m.val_si);
            if clamped != self.m.val_si {
                self.adjust(PropKey::M, clamped, &mut log);
            }
        }

        let free: Vec<usize> = self.fluid.free_indices().collect();
        for i in free {
            let entry = &self.fluid.entries()[i];
            let (name, val) = (entry.name.clone(), entry.val);
            let clamped = val.clamp(0.0, 1.0);
            if clamped != val {
                self.fluid.set_value(i, clamped);
                debug!(connection = %self.label(), fluid = %name, value = clamped, "mass fraction out of range, adjusting value");
                log.push(RangeAdjustment {
                    connection: self.label().to_string(),
                    quantity: Adjusted::Fraction(name),
                    from: val,
                    to: clamped,
                });
            }
        }
        log
    }

    /// Enthalpies at the lower and upper temperature limit of the present
    /// substances at the current pressure; `None` when either is unavailable.
    pub fn enthalpy_window(&self) -> Option<(f64, f64)> {
        let data = self.fluid_data();
        let (t_lo, t_hi) = data.temperature_window();
        if t_lo >= t_hi {
            return None;
        }
        let p = self.p.val_si;
        let lo = mixture::h_mix_pt(p, t_lo + 1e-1, &data).ok()?;
        let hi = mixture::h_mix_pt(p, t_hi, &data).ok()?;
        (hi > lo).then_some((lo, hi))
    }

    fn adjust(&mut self, key: PropKey, to: f64, log: &mut Vec<RangeAdjustment>) {
        let from = self.prop(key).val_si;
        self.prop_mut(key).val_si = to;
        debug!(
            connection = %self.label(),
            property = key.key(),
            value = to,
            "{} out of fluid property range, adjusting value",
            key.kind().name()
        );
        log.push(RangeAdjustment {
            connection: self.label().to_string(),
            quantity: Adjusted::Property(key),
            from,
            to,
        });
    }

    fn check_pressure_bounds(&mut self, w: &Arc<dyn FluidWrapper>, log: &mut Vec<RangeAdjustment>) {
        let b = w.bounds();
        if self.p.val_si > b.p_max {
            self.adjust(PropKey::P, b.p_max, log);
        } else if self.p.val_si < b.p_min && w.t_ph(self.p.val_si, self.h.val_si).is_err() {
            // below p_min only while no state can be found there
            self.adjust(PropKey::P, b.p_min + 1e1, log);
        }
    }

    /// Keep h between h(p, T_min) and h(p, T_max).
    fn check_enthalpy_bounds(&mut self, w: &Arc<dyn FluidWrapper>, log: &mut Vec<RangeAdjustment>) {
        let b = w.bounds();
        let p = self.p.val_si;
        let hmin = w
            .h_pt(p, b.t_min + 1e-1)
            .or_else(|_| w.h_pt(p, b.t_min * 1.05));
        let Ok(hmin) = hmin else {
            debug!(connection = %self.label(), p, "no minimum enthalpy available at this pressure");
            return;
        };
        if self.h.val_si < hmin {
            let to = if hmin < 0.0 { hmin * 0.9999 } else { hmin * 1.0001 };
            self.adjust(PropKey::H, to, log);
            return;
        }

        let mut t = b.t_max;
        let hmax = loop {
            match w.h_pt(p, t) {
                Ok(h) => break Some(h),
                Err(_) => {
                    t *= 0.99;
                    if t < b.t_min {
                        break None;
                    }
                }
            }
        };
        match hmax {
            Some(hmax) if self.h.val_si > hmax => self.adjust(PropKey::H, hmax * 0.9999, log),
            Some(_) => {}
            None => {
                debug!(connection = %self.label(), p, "no maximum enthalpy available at this pressure")
            }
        }
    }

    fn check_two_phase_bounds(&mut self, w: &Arc<dyn FluidWrapper>, log: &mut Vec<RangeAdjustment>) {
        let p = self.p.val_si;
        let gas = self.td_bp.val_si > 0.0 || self.state == Some(PhaseState::Gas);
        let liquid = self.td_bp.val_si < 0.0 || self.state == Some(PhaseState::Liquid);
        if gas {
            if let Ok(h_vap) = w.h_pq(p, 1.0) {
                if self.h.val_si < h_vap {
                    self.adjust(PropKey::H, h_vap * 1.01, log);
                }
            }
        } else if liquid {
            if let Ok(h_liq) = w.h_pq(p, 0.0) {
                if self.h.val_si > h_liq {
                    self.adjust(PropKey::H, h_liq * 0.99, log);
                }
            }
        }
    }

    /// Keep a mixture inside the common temperature window of its
    /// substances, narrowed by saturation when a phase is forced.
    fn check_temperature_bounds(&mut self, log: &mut Vec<RangeAdjustment>) {
        let p = self.p.val_si;
        let (mut t_lo, mut t_hi) = (f64::MIN, f64::MAX);
        for (w, e) in self.wrappers().iter().zip(self.fluid().entries()) {
            if e.val <= ERR || e.val >= 1.0 - ERR {
                continue;
            }
            let b = w.bounds();
            let (lo, hi) = match self.state {
                Some(PhaseState::Liquid) => (b.t_min, w.t_sat(p).unwrap_or(b.t_max)),
                Some(PhaseState::Gas) => (w.t_sat(p).unwrap_or(b.t_min), b.t_max),
                None => (b.t_min, b.t_max),
            };
            t_lo = t_lo.max(lo);
            t_hi = t_hi.min(hi);
        }
        if t_lo == f64::MIN || t_hi == f64::MAX {
            return;
        }
        let (t_lo, t_hi) = (t_lo * (1.0 + ERR), t_hi * (1.0 - ERR));
        let data = self.fluid_data();
        match (
            mixture::h_mix_pt(p, t_lo, &data),
            mixture::h_mix_pt(p, t_hi, &data),
        ) {
            (Ok(hmin), Ok(hmax)) => {
                if self.h.val_si < hmin {
                    self.adjust(PropKey::H, hmin, log);
                }
                if self.h.val_si > hmax {
                    self.adjust(PropKey::H, hmax, log);
                }
            }
            _ => debug!(connection = %self.label(), p, "mixture enthalpy window unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ConnectionAttr;
    use crate::connection::MASS_FLOW_LIMIT;
    use crate::connection::tests::{connection, water};
    use tn_fluids::{ClausiusClapeyronWrapper, IdealGasWrapper};

    fn free_water(p: f64, h: f64) -> Connection {
        let mut c = water("c1");
        c.p.val_si = p;
        c.h.val_si = h;
        c
    }

    #[test]
    fn enthalpy_below_positive_minimum_is_raised() {
        let w = ClausiusClapeyronWrapper::water();
        let b = w.bounds();
        let hmin = w.h_pt(1e5, b.t_min + 0.1).unwrap();
        assert!(hmin > 0.0);
        let mut c = free_water(1e5, -5e4);
        let log = c.check_bounds();
        assert_eq!(c.h.val_si, hmin * 1.0001);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].quantity, Adjusted::Property(PropKey::H));
        assert!(c.h.val_si >= hmin);
    }

    #[test]
    fn enthalpy_below_negative_minimum_is_raised() {
        // ideal gas enthalpy is zero at 298.15 K, so it is negative near t_min
        let w = IdealGasWrapper::nitrogen();
        let hmin = w.h_pt(1e5, w.bounds().t_min + 0.1).unwrap();
        assert!(hmin < 0.0);
        let mut c = connection("c1", &["N2"]);
        c.set_attr([ConnectionAttr::fluid([("N2", 1.0)])]).unwrap();
        c.p.val_si = 1e5;
        c.h.val_si = -1e6;
        let log = c.check_bounds();
        assert_eq!(c.h.val_si, hmin * 0.9999);
        assert!(c.h.val_si >= hmin);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn enthalpy_above_maximum_is_lowered() {
        let w = ClausiusClapeyronWrapper::water();
        let hmax = w.h_pt(1e5, w.bounds().t_max).unwrap();
        let mut c = free_water(1e5, hmax + 1e6);
        c.check_bounds();
        assert_eq!(c.h.val_si, hmax * 0.9999);
    }

    #[test]
    fn pressure_above_maximum_is_clamped() {
        let mut c = free_water(1e10, 1e5);
        c.check_bounds();
        assert_eq!(c.p.val_si, ClausiusClapeyronWrapper::water().bounds().p_max);
    }

    #[test]
    fn fixed_values_are_left_alone() {
        let mut c = water("c1");
        c.set_attr([
            ConnectionAttr::property(PropKey::P, 1e10),
            ConnectionAttr::property(PropKey::H, -1e6),
        ])
        .unwrap();
        assert!(c.check_bounds().is_empty());
        assert_eq!(c.p.val_si, 1e10);
    }

    #[test]
    fn forced_gas_state_lifts_enthalpy_above_dew_line() {
        let w = ClausiusClapeyronWrapper::water();
        let h_vap = w.h_pq(1e5, 1.0).unwrap();
        let mut c = free_water(1e5, 1e6);
        c.set_attr([ConnectionAttr::State(Some(PhaseState::Gas))])
            .unwrap();
        c.check_bounds();
        assert_eq!(c.h.val_si, h_vap * 1.01);
    }

    #[test]
    fn mixture_enthalpy_is_kept_in_temperature_window() {
        let mut c = connection("c1", &["N2", "O2"]);
        c.set_attr([ConnectionAttr::fluid([("N2", 0.7), ("O2", 0.3)])])
            .unwrap();
        c.p.val_si = 1e5;
        c.h.val_si = 1e9;
        let log = c.check_bounds();
        assert_eq!(log.len(), 1);
        let data = c.fluid_data();
        let (_, t_hi) = data.temperature_window();
        let hmax = mixture::h_mix_pt(1e5, t_hi * (1.0 - ERR), &data).unwrap();
        assert_eq!(c.h.val_si, hmax);
    }

    #[test]
    fn enthalpy_window_spans_the_temperature_limits() {
        let w = ClausiusClapeyronWrapper::water();
        let b = w.bounds();
        let c = free_water(1e5, 2e5);
        let (lo, hi) = c.enthalpy_window().unwrap();
        assert_eq!(lo, w.h_pt(1e5, b.t_min + 0.1).unwrap());
        assert_eq!(hi, w.h_pt(1e5, b.t_max).unwrap());

        let empty = connection("c2", &["N2", "O2"]);
        assert!(empty.enthalpy_window().is_none());
    }

    #[test]
    fn runaway_mass_flow_is_clamped() {
        let mut c = free_water(1e5, 2e5);
        c.m.val_si = 1e7;
        let log = c.check_bounds();
        assert_eq!(c.m.val_si, MASS_FLOW_LIMIT);
        assert_eq!(log[0].quantity, Adjusted::Property(PropKey::M));
    }
}
