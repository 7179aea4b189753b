//! Residuals and derivatives of connection equations.

use tn_core::ConnId;
use tn_fluids::mixture;

use crate::attrs::PropKey;
use crate::connection::{ConnEquation, Connection};
use crate::error::GraphResult;
use crate::ledger::{ConnColumns, EquationLedger, SolveContext};

impl Connection {
    /// Evaluate every active equation into rows `row0..row0 + n`.
    pub fn solve(
        &self,
        id: ConnId,
        ctx: &SolveContext<'_>,
        row0: usize,
        ledger: &mut EquationLedger,
    ) -> GraphResult<()> {
        let cols = ctx.columns.connection(id);
        for (k, equation) in self.equations().iter().enumerate() {
            let row = row0 + k;
            match *equation {
                ConnEquation::Temperature => {
                    ledger.set_residual(row, self.calc_t()? - self.t.val_si);
                    self.temperature_derivatives(row, cols, ctx, 1.0, ledger)?;
                }
                ConnEquation::VolumetricFlow => {
                    ledger.set_residual(row, self.calc_vol()? * self.m.val_si - self.v.val_si);
                    self.volumetric_flow_derivatives(row, cols, ctx, 1.0, ledger)?;
                }
                ConnEquation::VapourFraction => {
                    let data = self.fluid_data();
                    let (p, x) = (self.p.val_si, self.x.val_si);
                    ledger.set_residual(row, self.h.val_si - mixture::h_mix_pq(p, x, &data)?);
                    if cols.p.is_some() {
                        ledger.add(row, cols.p, -mixture::dh_mix_dpq(p, x, &data)?);
                    }
                    ledger.add(row, cols.h, 1.0);
                }
                ConnEquation::BoilingPointDelta => {
                    ledger.set_residual(row, self.calc_td_bp()? - self.td_bp.val_si);
                    self.temperature_derivatives(row, cols, ctx, 1.0, ledger)?;
                    if cols.p.is_some() {
                        let d = mixture::dt_sat_dp(self.p.val_si, &self.fluid_data())?;
                        ledger.add(row, cols.p, -d);
                    }
                }
                ConnEquation::Reference(key) => self.reference_equation(key, row, cols, ctx, ledger)?,
                ConnEquation::FluidBalance => {
                    let sum: f64 = self.fluid().values().iter().sum();
                    ledger.set_residual(row, 1.0 - sum);
                    for (_, col) in cols.fluid_columns() {
                        ledger.add(row, Some(col), -1.0);
                    }
                }
            }
        }
        Ok(())
    }

    fn reference_equation(
        &self,
        key: PropKey,
        row: usize,
        cols: &ConnColumns,
        ctx: &SolveContext<'_>,
        ledger: &mut EquationLedger,
    ) -> GraphResult<()> {
        let Some(reference) = self.reference(key) else {
            return Ok(());
        };
        let other = ctx.connections.get(reference.target())?;
        let other_cols = ctx.columns.connection(reference.target());
        let factor = reference.factor();
        let delta_si = self.prop(key).unit.delta_to_si(reference.delta());

        match key {
            PropKey::T => {
                let residual = reference.residual(self.calc_t()?, other.calc_t()?, delta_si);
                ledger.set_residual(row, residual);
                self.temperature_derivatives(row, cols, ctx, 1.0, ledger)?;
                other.temperature_derivatives(row, other_cols, ctx, -factor, ledger)?;
            }
            PropKey::V => {
                let y = self.calc_vol()? * self.m.val_si;
                let y_ref = other.calc_vol()? * other.m.val_si;
                ledger.set_residual(row, reference.residual(y, y_ref, delta_si));
                self.volumetric_flow_derivatives(row, cols, ctx, 1.0, ledger)?;
                other.volumetric_flow_derivatives(row, other_cols, ctx, -factor, ledger)?;
            }
            _ => {
                let residual =
                    reference.residual(self.prop(key).val_si, other.prop(key).val_si, delta_si);
                ledger.set_residual(row, residual);
                ledger.add(row, primary_column(cols, key), 1.0);
                ledger.add(row, primary_column(other_cols, key), -factor);
            }
        }
        Ok(())
    }

    /// `scale · ∂T/∂(p, h, y)` of this connection.
    pub fn temperature_derivatives(
        &self,
        row: usize,
        cols: &ConnColumns,
        ctx: &SolveContext<'_>,
        scale: f64,
        ledger: &mut EquationLedger,
    ) -> GraphResult<()> {
        let data = self.fluid_data();
        let (p, h, t0) = (self.p.val_si, self.h.val_si, self.t_hint());
        if cols.p.is_some() {
            ledger.add(row, cols.p, scale * mixture::dt_mix_dph(p, h, &data, t0)?);
        }
        if cols.h.is_some() {
            ledger.add(row, cols.h, scale * mixture::dt_mix_pdh(p, h, &data, t0)?);
        }
        for (i, col) in cols.fluid_columns() {
            if ctx.filter.evaluates(col) {
                let d = mixture::dt_mix_ph_dfluid(p, h, &data, i, t0)?;
                ledger.add(row, Some(col), scale * d);
            }
        }
        Ok(())
    }

    /// `scale · ∂(v · m)/∂(m, p, h, y)` of this connection.
    pub fn volumetric_flow_derivatives(
        &self,
        row: usize,
        cols: &ConnColumns,
        ctx: &SolveContext<'_>,
        scale: f64,
        ledger: &mut EquationLedger,
    ) -> GraphResult<()> {
        let data = self.fluid_data();
        let (m, p, h, t0) = (self.m.val_si, self.p.val_si, self.h.val_si, self.t_hint());
        if cols.m.is_some() {
            ledger.add(row, cols.m, scale * self.calc_vol()?);
        }
        if cols.p.is_some() {
            ledger.add(row, cols.p, scale * mixture::dv_mix_dph(p, h, &data, t0)? * m);
        }
        if cols.h.is_some() {
            ledger.add(row, cols.h, scale * mixture::dv_mix_pdh(p, h, &data, t0)? * m);
        }
        for (i, col) in cols.fluid_columns() {
            if ctx.filter.evaluates(col) {
                let d = mixture::dv_mix_ph_dfluid(p, h, &data, i, t0)?;
                ledger.add(row, Some(col), scale * d * m);
            }
        }
        Ok(())
    }
}

fn primary_column(cols: &ConnColumns, key: PropKey) -> Option<usize> {
    match key {
        PropKey::M => cols.m,
        PropKey::P => cols.p,
        PropKey::H => cols.h,
        _ => None,
    }
}
