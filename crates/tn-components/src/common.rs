//! Port views and numerical derivative helpers shared by all equations.

use tn_core::{ConnId, central_difference};
use tn_fluids::FluidData;
use tn_fluids::mixture::{self, D_ENTHALPY, D_FRACTION, D_PRESSURE};
use tn_graph::{ConnColumns, Connection, EquationLedger, SolveContext};

use crate::error::{ComponentError, ComponentResult};

/// Finite difference step for mass flow derivatives, kg/s.
pub const D_MASS_FLOW: f64 = 1e-4;

/// Below this mass flow the friction equation degenerates to `p_in = p_out`.
pub const EPSILON_MDOT: f64 = 1e-4;

/// A connection seen from one of its components.
#[derive(Clone, Copy)]
pub struct Port<'a> {
    pub id: ConnId,
    pub conn: &'a Connection,
    pub cols: &'a ConnColumns,
}

impl<'a> Port<'a> {
    pub fn resolve(id: ConnId, ctx: &SolveContext<'a>) -> ComponentResult<Self> {
        Ok(Self {
            id,
            conn: ctx.connections.get(id)?,
            cols: ctx.columns.connection(id),
        })
    }
}

/// State variable perturbed by a numerical derivative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateVar {
    M,
    P,
    H,
}

/// Snapshot of `(m, p, h, y)` a residual closure can evaluate.
#[derive(Clone, Debug)]
pub struct FlowState {
    pub m: f64,
    pub p: f64,
    pub h: f64,
    pub data: FluidData,
    pub t0: Option<f64>,
}

impl FlowState {
    pub fn of(conn: &Connection) -> Self {
        Self {
            m: conn.m.val_si,
            p: conn.p.val_si,
            h: conn.h.val_si,
            data: conn.fluid_data(),
            t0: conn.t.val_si.is_finite().then_some(conn.t.val_si),
        }
    }

    fn get(&self, var: StateVar) -> f64 {
        match var {
            StateVar::M => self.m,
            StateVar::P => self.p,
            StateVar::H => self.h,
        }
    }

    fn set(&mut self, var: StateVar, v: f64) {
        match var {
            StateVar::M => self.m = v,
            StateVar::P => self.p = v,
            StateVar::H => self.h = v,
        }
    }

    pub fn t(&self) -> ComponentResult<f64> {
        Ok(mixture::t_mix_ph(self.p, self.h, &self.data, self.t0)?)
    }

    pub fn v(&self) -> ComponentResult<f64> {
        Ok(mixture::v_mix_ph(self.p, self.h, &self.data, self.t0)?)
    }

    pub fn s(&self) -> ComponentResult<f64> {
        Ok(mixture::s_mix_ph(self.p, self.h, &self.data, self.t0)?)
    }

    /// Outlet enthalpy of an isentropic change of state to `p_out`.
    pub fn isentropic(&self, p_out: f64) -> ComponentResult<f64> {
        Ok(mixture::isentropic(self.p, self.h, p_out, &self.data, self.t0)?)
    }
}

fn column(cols: &ConnColumns, var: StateVar) -> Option<usize> {
    match var {
        StateVar::M => cols.m,
        StateVar::P => cols.p,
        StateVar::H => cols.h,
    }
}

fn step(var: StateVar) -> f64 {
    match var {
        StateVar::M => D_MASS_FLOW,
        StateVar::P => D_PRESSURE,
        StateVar::H => D_ENTHALPY,
    }
}

/// Central differences of `f` with respect to `vars` and the mass fractions
/// of every port that are free in the current solve.
pub fn numeric_derivatives<F>(
    row: usize,
    ports: &[Port<'_>],
    vars: &[StateVar],
    ledger: &mut EquationLedger,
    f: F,
) -> ComponentResult<()>
where
    F: Fn(&[FlowState]) -> ComponentResult<f64>,
{
    let base: Vec<FlowState> = ports.iter().map(|p| FlowState::of(p.conn)).collect();
    for (k, port) in ports.iter().enumerate() {
        for &var in vars {
            let Some(col) = column(port.cols, var) else {
                continue;
            };
            let mut states = base.clone();
            let d = central_difference(
                |x| {
                    states[k].set(var, x);
                    f(&states)
                },
                base[k].get(var),
                step(var),
            )?;
            ledger.add(row, Some(col), d);
        }
        for (i, col) in port.cols.fluid_columns() {
            let d = fraction_difference(&base, k, i, &f)?;
            ledger.add(row, Some(col), d);
        }
    }
    Ok(())
}

/// Derivative of `f` with respect to fraction `i` of state `k`; one-sided
/// where a central step would go below zero.
fn fraction_difference<F>(states: &[FlowState], k: usize, i: usize, f: &F) -> ComponentResult<f64>
where
    F: Fn(&[FlowState]) -> ComponentResult<f64>,
{
    let y = states[k]
        .data
        .entries()
        .get(i)
        .map_or(0.0, |e| e.mass_fraction);
    let mut shifted = states.to_vec();
    let mut at = |y: f64| {
        shifted[k].data = states[k].data.with_fraction(i, y);
        f(&shifted)
    };
    let upper = at(y + D_FRACTION)?;
    if y < D_FRACTION {
        return Ok((upper - f(states)?) / D_FRACTION);
    }
    Ok((upper - at(y - D_FRACTION)?) / (2.0 * D_FRACTION))
}

/// Ensure a value is finite, returning `NonPhysical` if not.
pub fn check_finite(value: f64, what: &'static str) -> ComponentResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComponentError::NonPhysical { what })
    }
}

/// Log mean temperature difference of a stream against a constant
/// temperature; falls back to the arithmetic mean when the logarithm is
/// undefined.
pub fn log_mean_difference(t_in: f64, t_out: f64, t_other: f64) -> f64 {
    let (d1, d2) = (t_in - t_other, t_out - t_other);
    if d1 * d2 <= 0.0 || (d1 - d2).abs() <= 1e-9 * d1.abs().max(1.0) {
        0.5 * (d1 + d2)
    } else {
        (d1 - d2) / (d1 / d2).ln()
    }
}
