//! Residuals and Jacobian contributions of component equations.
//!
//! Each equation writes `rows()` consecutive rows starting at the row the
//! component was assigned. Linear balances carry analytic derivatives;
//! equations that go through fluid properties use central differences on
//! the free columns only.

use std::f64::consts::PI;

use tn_graph::EquationLedger;

use crate::characteristics::CharParam;
use crate::common::{
    EPSILON_MDOT, FlowState, Port, StateVar, check_finite, log_mean_difference,
    numeric_derivatives,
};
use crate::component::{Component, ComponentKind};
use crate::error::{ComponentError, ComponentResult};
use crate::params::ParamKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentEquation {
    /// `Σ m_in - Σ m_out`
    MassFlow,
    /// Every outlet carries the inlet composition; fractions fixed on both
    /// sides get no row.
    FluidEquality,
    /// Mass balance of each substance over a merge.
    FluidMixing,
    /// Outlet enthalpy equals inlet enthalpy, per outlet.
    EnthalpyEquality,
    /// `Σ m_in h_in - m_out h_out`
    EnergyBalance,
    /// Common pressure of all inlets (merge) or all outlets (splitter).
    PressureEquality,
    /// `p_out - pr p_in`
    PressureRatio,
    /// Friction pressure drop.
    Zeta,
    /// `m (h_out - h_in) - Q`
    HeatFlow,
    /// `m (h_out - h_in) - P`
    Power,
    IsentropicEfficiency,
    /// Heat exchanged with the ambient through `kA` and the log mean
    /// temperature difference.
    KaGroup,
    /// `p_in - p_out - f(x)` with `x` the inlet mass or volumetric flow.
    DpChar,
}

fn fraction(port: &Port<'_>, i: usize) -> f64 {
    port.conn.fluid().entries().get(i).map_or(0.0, |e| e.val)
}

fn param_col(comp: &Component, key: ParamKey) -> Option<usize> {
    comp.param(key).and_then(|p| p.column())
}

fn single<'a>(ports: &[Port<'a>], comp: &Component) -> ComponentResult<Port<'a>> {
    ports.first().copied().ok_or_else(|| {
        ComponentError::config(format!(
            "component '{}' is missing a connection",
            comp.label()
        ))
    })
}

impl ComponentEquation {
    pub fn rows(self, comp: &Component) -> usize {
        let kind = comp.kind();
        match self {
            ComponentEquation::FluidEquality => comp.fluid_rows.len(),
            ComponentEquation::FluidMixing => comp.num_fluids(),
            ComponentEquation::EnthalpyEquality => kind.num_outlets(),
            ComponentEquation::PressureEquality => kind.num_inlets().max(kind.num_outlets()),
            _ => 1,
        }
    }

    pub(crate) fn evaluate(
        self,
        comp: &Component,
        inl: &[Port<'_>],
        outl: &[Port<'_>],
        row: usize,
        ledger: &mut EquationLedger,
    ) -> ComponentResult<()> {
        match self {
            ComponentEquation::MassFlow => {
                let sum_in: f64 = inl.iter().map(|c| c.conn.m.val_si).sum();
                let sum_out: f64 = outl.iter().map(|c| c.conn.m.val_si).sum();
                ledger.set_residual(row, sum_in - sum_out);
                inl.iter().for_each(|c| ledger.add(row, c.cols.m, 1.0));
                outl.iter().for_each(|c| ledger.add(row, c.cols.m, -1.0));
            }
            ComponentEquation::FluidEquality => {
                let i = single(inl, comp)?;
                for (r, &(j, k)) in comp.fluid_rows.iter().enumerate() {
                    let o = single(outl.get(j..).unwrap_or(&[]), comp)?;
                    ledger.set_residual(row + r, fraction(&i, k) - fraction(&o, k));
                    ledger.add(row + r, i.cols.fraction(k), 1.0);
                    ledger.add(row + r, o.cols.fraction(k), -1.0);
                }
            }
            ComponentEquation::FluidMixing => {
                let o = single(outl, comp)?;
                for k in 0..comp.num_fluids() {
                    let r = row + k;
                    let mut res = -o.conn.m.val_si * fraction(&o, k);
                    for c in inl {
                        res += c.conn.m.val_si * fraction(c, k);
                        ledger.add(r, c.cols.m, fraction(c, k));
                        ledger.add(r, c.cols.fraction(k), c.conn.m.val_si);
                    }
                    ledger.set_residual(r, res);
                    ledger.add(r, o.cols.m, -fraction(&o, k));
                    ledger.add(r, o.cols.fraction(k), -o.conn.m.val_si);
                }
            }
            ComponentEquation::EnthalpyEquality => {
                let i = single(inl, comp)?;
                for (j, o) in outl.iter().enumerate() {
                    ledger.set_residual(row + j, i.conn.h.val_si - o.conn.h.val_si);
                    ledger.add(row + j, i.cols.h, 1.0);
                    ledger.add(row + j, o.cols.h, -1.0);
                }
            }
            ComponentEquation::EnergyBalance => {
                let o = single(outl, comp)?;
                let mut res = -o.conn.m.val_si * o.conn.h.val_si;
                for c in inl {
                    res += c.conn.m.val_si * c.conn.h.val_si;
                    ledger.add(row, c.cols.m, c.conn.h.val_si);
                    ledger.add(row, c.cols.h, c.conn.m.val_si);
                }
                ledger.set_residual(row, res);
                ledger.add(row, o.cols.m, -o.conn.h.val_si);
                ledger.add(row, o.cols.h, -o.conn.m.val_si);
            }
            ComponentEquation::PressureEquality => {
                let (common, others) = if inl.len() > 1 {
                    (single(outl, comp)?, inl)
                } else {
                    (single(inl, comp)?, outl)
                };
                for (j, c) in others.iter().enumerate() {
                    ledger.set_residual(row + j, c.conn.p.val_si - common.conn.p.val_si);
                    ledger.add(row + j, c.cols.p, 1.0);
                    ledger.add(row + j, common.cols.p, -1.0);
                }
            }
            ComponentEquation::PressureRatio => {
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let pr = comp.value(ParamKey::Pr);
                ledger.set_residual(row, o.conn.p.val_si - pr * i.conn.p.val_si);
                ledger.add(row, i.cols.p, -pr);
                ledger.add(row, o.cols.p, 1.0);
                ledger.add(row, param_col(comp, ParamKey::Pr), -i.conn.p.val_si);
            }
            ComponentEquation::Zeta => {
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let zeta = comp.value(ParamKey::Zeta);
                let f = |s: &[FlowState]| -> ComponentResult<f64> {
                    zeta_residual(zeta, &s[0], &s[1])
                };
                let res = f(&[FlowState::of(i.conn), FlowState::of(o.conn)])?;
                ledger.set_residual(row, res);
                numeric_derivatives(
                    row,
                    &[i, o],
                    &[StateVar::M, StateVar::P, StateVar::H],
                    ledger,
                    f,
                )?;
                ledger.add(row, param_col(comp, ParamKey::Zeta), 1.0);
            }
            ComponentEquation::HeatFlow | ComponentEquation::Power => {
                let key = if self == ComponentEquation::HeatFlow {
                    ParamKey::Q
                } else {
                    ParamKey::P
                };
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let m = i.conn.m.val_si;
                let dh = o.conn.h.val_si - i.conn.h.val_si;
                ledger.set_residual(row, m * dh - comp.value(key));
                ledger.add(row, i.cols.m, dh);
                ledger.add(row, i.cols.h, -m);
                ledger.add(row, o.cols.h, m);
                ledger.add(row, param_col(comp, key), -1.0);
            }
            ComponentEquation::IsentropicEfficiency => {
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let eta = comp.value(ParamKey::EtaS);
                let expansion = comp.kind() == ComponentKind::Turbine;
                let f = |s: &[FlowState]| -> ComponentResult<f64> {
                    let h_s = s[0].isentropic(s[1].p)?;
                    let (ideal, real) = (h_s - s[0].h, s[1].h - s[0].h);
                    Ok(if expansion {
                        real - eta * ideal
                    } else {
                        ideal - eta * real
                    })
                };
                let states = [FlowState::of(i.conn), FlowState::of(o.conn)];
                ledger.set_residual(row, check_finite(f(&states)?, "isentropic efficiency")?);
                numeric_derivatives(row, &[i, o], &[StateVar::P, StateVar::H], ledger, f)?;
                if let Some(col) = param_col(comp, ParamKey::EtaS) {
                    let h_s = states[0].isentropic(states[1].p)?;
                    let d = if expansion {
                        -(h_s - states[0].h)
                    } else {
                        -(states[1].h - states[0].h)
                    };
                    ledger.add(row, Some(col), d);
                }
            }
            ComponentEquation::KaGroup => {
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let ka = comp.value(ParamKey::KA);
                let t_amb = comp.value(ParamKey::Tamb);
                let f = |s: &[FlowState]| -> ComponentResult<f64> {
                    let lmtd = log_mean_difference(s[0].t()?, s[1].t()?, t_amb);
                    Ok(s[0].m * (s[1].h - s[0].h) + ka * lmtd)
                };
                let states = [FlowState::of(i.conn), FlowState::of(o.conn)];
                ledger.set_residual(row, check_finite(f(&states)?, "heat transfer group")?);
                numeric_derivatives(
                    row,
                    &[i, o],
                    &[StateVar::M, StateVar::P, StateVar::H],
                    ledger,
                    f,
                )?;
                if let Some(col) = param_col(comp, ParamKey::KA) {
                    let lmtd = log_mean_difference(states[0].t()?, states[1].t()?, t_amb);
                    ledger.add(row, Some(col), lmtd);
                }
            }
            ComponentEquation::DpChar => {
                let Some(dp_char) = comp.dp_char() else {
                    return Ok(());
                };
                let (i, o) = (single(inl, comp)?, single(outl, comp)?);
                let f = |s: &[FlowState]| -> ComponentResult<f64> {
                    let x = match dp_char.param {
                        CharParam::MassFlow => s[0].m,
                        CharParam::VolumetricFlow => s[0].m * s[0].v()?,
                    };
                    Ok(s[0].p - s[1].p - dp_char.line.evaluate(x))
                };
                let states = [FlowState::of(i.conn), FlowState::of(o.conn)];
                ledger.set_residual(row, check_finite(f(&states)?, "pressure drop characteristic")?);
                let vars: &[StateVar] = match dp_char.param {
                    CharParam::MassFlow => &[StateVar::M],
                    CharParam::VolumetricFlow => &[StateVar::M, StateVar::P, StateVar::H],
                };
                numeric_derivatives(row, &[i], vars, ledger, |s: &[FlowState]| {
                    f(&[s[0].clone(), states[1].clone()])
                })?;
                if dp_char.param == CharParam::MassFlow {
                    ledger.add(row, i.cols.p, 1.0);
                }
                ledger.add(row, o.cols.p, -1.0);
            }
        }
        Ok(())
    }
}

/// `zeta - (p_in - p_out) π² / (4 m |m| (v_in + v_out))`; degenerates to
/// `p_in - p_out` for vanishing mass flow.
pub(crate) fn zeta_residual(zeta: f64, i: &FlowState, o: &FlowState) -> ComponentResult<f64> {
    if i.m.abs() < EPSILON_MDOT {
        return Ok(i.p - o.p);
    }
    let v = i.v()? + o.v()?;
    check_finite(
        zeta - (i.p - o.p) * PI * PI / (4.0 * i.m * i.m.abs() * v),
        "friction coefficient",
    )
}

/// Friction coefficient implied by a state pair, NaN without flow.
pub(crate) fn zeta_of(i: &FlowState, o: &FlowState) -> ComponentResult<f64> {
    if i.m.abs() < EPSILON_MDOT {
        return Ok(f64::NAN);
    }
    let v = i.v()? + o.v()?;
    Ok((i.p - o.p) * PI * PI / (4.0 * i.m * i.m.abs() * v))
}
