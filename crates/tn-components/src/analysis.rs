//! Post-processing of a solved component: derived parameters, entropy
//! generation, exergy balance and bus contributions.

use tn_graph::{Connection, ConnectionRegistry, EquationLedger, SolveContext};
use tracing::debug;

use crate::common::{FlowState, Port, log_mean_difference};
use crate::component::{Component, ComponentKind};
use crate::equations::zeta_of;
use crate::error::{ComponentError, ComponentResult};
use crate::params::ParamKey;

/// Exergy balance of one component, W.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExergyBalance {
    pub fuel: f64,
    /// `None` for purely dissipative components.
    pub product: Option<f64>,
    /// `fuel - product`
    pub destruction: f64,
    pub efficiency: Option<f64>,
}

impl ExergyBalance {
    fn new(fuel: f64, product: Option<f64>) -> Self {
        Self {
            fuel,
            product,
            destruction: fuel - product.unwrap_or(0.0),
            efficiency: product.map(|p| p / fuel),
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { f64::NAN } else { num / den }
}

impl Component {
    fn streams<'a>(
        &self,
        connections: &'a ConnectionRegistry,
    ) -> ComponentResult<(Vec<&'a Connection>, Vec<&'a Connection>)> {
        let inl = self
            .inlets()?
            .into_iter()
            .map(|id| connections.get(id))
            .collect::<Result<Vec<_>, _>>()?;
        let outl = self
            .outlets()?
            .into_iter()
            .map(|id| connections.get(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((inl, outl))
    }

    fn single_stream<'a>(
        &self,
        connections: &'a ConnectionRegistry,
    ) -> ComponentResult<(&'a Connection, &'a Connection)> {
        let (inl, outl) = self.streams(connections)?;
        match (inl.first(), outl.first()) {
            (Some(&i), Some(&o)) => Ok((i, o)),
            _ => Err(ComponentError::config(format!(
                "a {} has no single stream",
                self.kind().name()
            ))),
        }
    }

    /// Fill every unset parameter from the solved connection states.
    pub fn calc_parameters(&mut self, connections: &ConnectionRegistry) -> ComponentResult<()> {
        let kind = self.kind();
        if matches!(
            kind,
            ComponentKind::Source
                | ComponentKind::Sink
                | ComponentKind::Merge { .. }
                | ComponentKind::Splitter { .. }
        ) {
            return Ok(());
        }
        let (i, o) = self.single_stream(connections)?;
        let (si, so) = (FlowState::of(i), FlowState::of(o));
        let dh = so.h - si.h;

        let mut values = vec![
            (ParamKey::Pr, ratio(so.p, si.p)),
            (ParamKey::Zeta, zeta_of(&si, &so)?),
        ];
        match kind {
            ComponentKind::SimpleHeatExchanger => {
                let q = si.m * dh;
                values.push((ParamKey::Q, q));
                let t_amb = self.value(ParamKey::Tamb);
                if t_amb.is_finite() {
                    let lmtd = log_mean_difference(si.t()?, so.t()?, t_amb);
                    values.push((ParamKey::KA, ratio(-q, lmtd)));
                }
            }
            ComponentKind::Compressor | ComponentKind::Pump | ComponentKind::Turbine => {
                values.push((ParamKey::P, si.m * dh));
                let h_s = si.isentropic(so.p)?;
                let eta = if kind == ComponentKind::Turbine {
                    ratio(dh, h_s - si.h)
                } else {
                    ratio(h_s - si.h, dh)
                };
                values.push((ParamKey::EtaS, eta));
            }
            _ => {}
        }

        for (key, val) in values {
            if let Some(p) = self.param_mut(key) {
                if !p.is_set {
                    p.val = val;
                }
            }
        }
        debug!(component = %self.label(), "parameters calculated");
        Ok(())
    }

    /// Entropy generation `Σ m s_out - Σ m s_in`, W/K. A heat exchanger
    /// with an ambient temperature also accounts for the heat crossing its
    /// boundary.
    pub fn entropy_generation(&self, connections: &ConnectionRegistry) -> ComponentResult<f64> {
        let (inl, outl) = self.streams(connections)?;
        let mut s_gen = 0.0;
        for c in &outl {
            s_gen += c.m.val_si * c.calc_s()?;
        }
        for c in &inl {
            s_gen -= c.m.val_si * c.calc_s()?;
        }
        if self.kind() == ComponentKind::SimpleHeatExchanger {
            let t_amb = self.value(ParamKey::Tamb);
            if t_amb.is_finite() && t_amb > 0.0 {
                let (i, o) = self.single_stream(connections)?;
                s_gen -= i.m.val_si * (o.h.val_si - i.h.val_si) / t_amb;
            }
        }
        Ok(s_gen)
    }

    /// Fuel and product exergy against the dead state `(p0, t0)`.
    pub fn exergy_balance(
        &self,
        connections: &ConnectionRegistry,
        p0: f64,
        t0: f64,
    ) -> ComponentResult<ExergyBalance> {
        let (inl, outl) = self.streams(connections)?;
        let flow = |c: &Connection| -> ComponentResult<f64> {
            Ok(c.m.val_si * c.physical_exergy(p0, t0)?.total())
        };
        let sum = |cs: &[&Connection]| -> ComponentResult<f64> {
            cs.iter().map(|&c| flow(c)).sum()
        };

        Ok(match self.kind() {
            ComponentKind::Source => ExergyBalance::new(0.0, Some(sum(&outl)?)),
            ComponentKind::Sink => ExergyBalance::new(sum(&inl)?, None),
            ComponentKind::Merge { .. } | ComponentKind::Splitter { .. } => {
                ExergyBalance::new(sum(&inl)?, Some(sum(&outl)?))
            }
            ComponentKind::Valve => {
                let (i, o) = self.single_stream(connections)?;
                let (ei, eo) = (i.physical_exergy(p0, t0)?, o.physical_exergy(p0, t0)?);
                let m = i.m.val_si;
                let (ti, to) = (i.calc_t()?, o.calc_t()?);
                if ti > t0 && to > t0 {
                    ExergyBalance::new(m * (ei.total() - eo.total()), None)
                } else if ti > t0 && to <= t0 {
                    ExergyBalance::new(
                        m * (ei.thermal + ei.mechanical - eo.mechanical),
                        Some(m * eo.thermal),
                    )
                } else if ti <= t0 && to <= t0 {
                    ExergyBalance::new(
                        m * (ei.mechanical - eo.mechanical),
                        Some(m * (eo.thermal - ei.thermal)),
                    )
                } else {
                    ExergyBalance {
                        fuel: f64::NAN,
                        product: None,
                        destruction: f64::NAN,
                        efficiency: None,
                    }
                }
            }
            ComponentKind::Compressor | ComponentKind::Pump => {
                let (i, o) = self.single_stream(connections)?;
                ExergyBalance::new(self.value(ParamKey::P), Some(flow(o)? - flow(i)?))
            }
            ComponentKind::Turbine => {
                let (i, o) = self.single_stream(connections)?;
                ExergyBalance::new(flow(i)? - flow(o)?, Some(-self.value(ParamKey::P)))
            }
            ComponentKind::SimpleHeatExchanger => {
                let (i, o) = self.single_stream(connections)?;
                let q = self.value(ParamKey::Q);
                if q <= 0.0 {
                    ExergyBalance::new(flow(i)? - flow(o)?, None)
                } else {
                    let product = flow(o)? - flow(i)?;
                    let t_amb = self.value(ParamKey::Tamb);
                    let fuel = if t_amb.is_finite() && t_amb > 0.0 {
                        q * (1.0 - t0 / t_amb)
                    } else {
                        product
                    };
                    ExergyBalance::new(fuel, Some(product))
                }
            }
        })
    }

    /// Energy flow this component contributes to a bus: heat for heat
    /// exchangers, power for turbomachines.
    pub fn bus_flow(&self, connections: &ConnectionRegistry) -> ComponentResult<f64> {
        self.bus_capable()?;
        let (i, o) = self.single_stream(connections)?;
        Ok(i.m.val_si * (o.h.val_si - i.h.val_si))
    }

    /// Derivatives of `scale * bus_flow` into `row`.
    pub fn bus_flow_derivatives(
        &self,
        row: usize,
        scale: f64,
        ctx: &SolveContext<'_>,
        ledger: &mut EquationLedger,
    ) -> ComponentResult<()> {
        self.bus_capable()?;
        let (inl, outl) = self.ports(ctx)?;
        let (Some(i), Some(o)) = (inl.first(), outl.first()) else {
            return Err(ComponentError::config("bus component without a stream"));
        };
        add_flow_derivatives(row, scale, i, o, ledger);
        Ok(())
    }

    /// Configuration error unless this kind has a bus energy flow.
    pub fn bus_capable(&self) -> ComponentResult<()> {
        match self.kind() {
            ComponentKind::SimpleHeatExchanger
            | ComponentKind::Compressor
            | ComponentKind::Pump
            | ComponentKind::Turbine => Ok(()),
            kind => Err(ComponentError::config(format!(
                "component '{}' ({}) cannot be connected to a bus",
                self.label(),
                kind.name()
            ))),
        }
    }
}

fn add_flow_derivatives(
    row: usize,
    scale: f64,
    i: &Port<'_>,
    o: &Port<'_>,
    ledger: &mut EquationLedger,
) {
    let m = i.conn.m.val_si;
    let dh = o.conn.h.val_si - i.conn.h.val_si;
    ledger.add(row, i.cols.m, scale * dh);
    ledger.add(row, i.cols.h, -scale * m);
    ledger.add(row, o.cols.h, scale * m);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exergy_balance_derives_destruction_and_efficiency() {
        let b = ExergyBalance::new(10.0, Some(8.0));
        assert_eq!(b.destruction, 2.0);
        assert_eq!(b.efficiency, Some(0.8));
        let d = ExergyBalance::new(3.0, None);
        assert_eq!(d.destruction, 3.0);
        assert_eq!(d.efficiency, None);
    }

    #[test]
    fn only_heat_and_work_reach_a_bus() {
        assert!(Component::new("v", ComponentKind::Valve).bus_capable().is_err());
        assert!(Component::new("t", ComponentKind::Turbine).bus_capable().is_ok());
    }
}
