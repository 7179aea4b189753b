//! Post-processing of a converged connection.

use tn_core::ERR;
use tn_fluids::mixture;
use tracing::error;

use crate::attrs::PropKey;
use crate::connection::Connection;
use crate::error::GraphResult;

/// Physical exergy split into its thermal and mechanical parts, J/kg.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalExergy {
    pub thermal: f64,
    pub mechanical: f64,
}

impl PhysicalExergy {
    pub fn total(&self) -> f64 {
        self.thermal + self.mechanical
    }
}

impl Connection {
    /// Fill the derived properties from the solved (m, p, h, y) and refresh
    /// the display values. Returns `false` when a mixture state could not be
    /// reproduced, in which case the unset derived properties are NaN.
    pub fn calc_results(&mut self) -> GraphResult<bool> {
        let data = self.fluid_data();
        let (p, h) = (self.p.val_si, self.h.val_si);
        let mixed = data.number_of_fluids() > 1;
        let t = match mixture::t_mix_ph(p, h, &data, self.t_hint()) {
            Ok(t) => Some(t),
            Err(e) if mixed => {
                error!(connection = %self.label(), p, h, error = %e, "mixture temperature inversion failed");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let consistent = if mixed {
            let h_back = t.map(|t| mixture::h_mix_pt(p, t, &data));
            match h_back {
                Some(Ok(h_back)) if (h_back - h).abs() <= ERR.sqrt() => true,
                Some(Ok(h_back)) => {
                    error!(
                        connection = %self.label(),
                        h,
                        h_back,
                        "could not find a temperature reproducing the mixture enthalpy"
                    );
                    false
                }
                Some(Err(e)) => {
                    error!(connection = %self.label(), error = %e, "mixture enthalpy check failed");
                    false
                }
                None => false,
            }
        } else {
            if !self.x.is_set {
                self.x.val_si = self.calc_x().unwrap_or(f64::NAN);
            }
            if !self.td_bp.is_set {
                self.td_bp.val_si = self.calc_td_bp().unwrap_or(f64::NAN);
            }
            true
        };

        if !self.t.is_set {
            self.t.val_si = t.unwrap_or(f64::NAN);
        }
        if !consistent {
            for key in [PropKey::T, PropKey::Vol, PropKey::V, PropKey::S] {
                let c = self.prop_mut(key);
                if !c.is_set {
                    c.val_si = f64::NAN;
                }
            }
        }

        if consistent {
            self.vol.val_si = self.calc_vol().unwrap_or(f64::NAN);
            if !self.v.is_set {
                self.v.val_si = self.vol.val_si * self.m.val_si;
            }
            self.s.val_si = self.calc_s().unwrap_or(f64::NAN);
        }

        for key in PropKey::ALL {
            self.prop_mut(key).sync_val();
        }
        for key in [PropKey::M, PropKey::P, PropKey::H] {
            let c = self.prop_mut(key);
            c.val0 = c.val;
        }
        let values = self.fluid.values();
        for (i, y) in values.into_iter().enumerate() {
            self.fluid.set_start_at(i, y);
        }
        Ok(consistent)
    }

    /// Physical exergy relative to the dead state `(p0, t0)`.
    pub fn physical_exergy(&self, p0: f64, t0: f64) -> GraphResult<PhysicalExergy> {
        let data = self.fluid_data();
        let (p, h) = (self.p.val_si, self.h.val_si);
        let s = mixture::s_mix_ph(p, h, &data, self.t_hint())?;
        let h_t0 = mixture::h_mix_pt(p, t0, &data)?;
        let s_t0 = mixture::s_mix_pt(p, t0, &data)?;
        let h_0 = mixture::h_mix_pt(p0, t0, &data)?;
        let s_0 = mixture::s_mix_pt(p0, t0, &data)?;
        Ok(PhysicalExergy {
            thermal: (h - h_t0) - t0 * (s - s_t0),
            mechanical: (h_t0 - h_0) - t0 * (s_t0 - s_0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ConnectionAttr;
    use crate::connection::tests::{connection, water};
    use tn_core::Unit;

    #[test]
    fn results_fill_derived_properties_and_display_values() {
        let mut c = water("c1");
        c.set_attr([ConnectionAttr::Unit(PropKey::P, Unit::Bar)])
            .unwrap();
        c.m.val_si = 2.0;
        c.p.val_si = 1e5;
        c.h.val_si = 2e5;
        assert!(c.calc_results().unwrap());
        assert_eq!(c.t.val_si, c.calc_t().unwrap());
        assert!((c.p.val - 1.0).abs() < 1e-12);
        assert_eq!(c.v.val_si, c.vol.val_si * 2.0);
        assert!(c.x.val_si < 0.0);
        assert!(c.td_bp.val_si < 0.0);
        assert!(c.s.val_si.is_finite());
        assert_eq!(c.h.val0, c.h.val);
    }

    #[test]
    fn fixed_volumetric_flow_is_not_overwritten() {
        let mut c = water("c1");
        c.set_attr([ConnectionAttr::property(PropKey::V, 0.5)])
            .unwrap();
        c.m.val_si = 2.0;
        c.p.val_si = 1e5;
        c.h.val_si = 2e5;
        c.calc_results().unwrap();
        assert_eq!(c.v.val_si, 0.5);
    }

    #[test]
    fn exergy_vanishes_at_the_dead_state() {
        let mut c = connection("c1", &["N2", "O2"]);
        c.set_attr([ConnectionAttr::fluid([("N2", 0.77), ("O2", 0.23)])])
            .unwrap();
        c.p.val_si = 1e5;
        c.h.val_si = mixture::h_mix_pt(1e5, 298.15, &c.fluid_data()).unwrap();
        let e = c.physical_exergy(1e5, 298.15).unwrap();
        assert!(e.thermal.abs() < 1e-3);
        assert!(e.mechanical.abs() < 1e-9);

        c.p.val_si = 5e5;
        let e = c.physical_exergy(1e5, 298.15).unwrap();
        assert!(e.mechanical > 0.0);
        assert!(e.total() > 0.0);
    }

    fn air(p: f64, h: f64) -> Connection {
        let mut c = connection("c1", &["N2", "O2"]);
        c.set_attr([ConnectionAttr::fluid([("N2", 0.7), ("O2", 0.3)])])
            .unwrap();
        c.m.val_si = 1.0;
        c.p.val_si = p;
        c.h.val_si = h;
        c
    }

    #[test]
    fn unreachable_mixture_enthalpy_leaves_derived_properties_undefined() {
        let mut c = air(1e5, 1e9);
        assert!(!c.calc_results().unwrap());
        assert!(c.t.val_si.is_nan());
        assert!(c.vol.val_si.is_nan());
        assert!(c.v.val_si.is_nan());
        assert!(c.s.val_si.is_nan());
        assert_eq!(c.h.val0, 1e9);
    }

    #[test]
    fn reproducible_mixture_state_is_consistent() {
        let mut c = connection("c1", &["N2", "O2"]);
        c.set_attr([ConnectionAttr::fluid([("N2", 0.7), ("O2", 0.3)])])
            .unwrap();
        let h = mixture::h_mix_pt(1e5, 350.0, &c.fluid_data()).unwrap();
        let mut c = air(1e5, h);
        assert!(c.calc_results().unwrap());
        assert!((c.t.val_si - 350.0).abs() < 1e-3);
        assert!(c.s.val_si.is_finite());
        assert!(c.v.val_si > 0.0);
    }
}
