//! Starting values for the Newton iteration.
//!
//! Free (m, p, h) take, in order: an explicit starting value (which is
//! also where the results of a previous run end up), a default suggested
//! by the component at either end, the design value in offdesign runs, and
//! finally a generic guess. Free mass fractions are copied along components
//! from connections whose composition is known.

use tn_components::{Component, Side};
use tn_core::ConnId;
use tn_fluids::mixture;
use tn_graph::{Connection, PropKey};
use tracing::debug;

use crate::error::SolverResult;
use crate::mode::SolveMode;
use crate::network::Network;

const DEFAULT_MASS_FLOW: f64 = 1.0;
const DEFAULT_PRESSURE: f64 = 1e5;
const DEFAULT_TEMPERATURE: f64 = 300.0;
const DEFAULT_ENTHALPY: f64 = 5e5;

fn composition_known(conn: &Connection) -> bool {
    conn.fluid()
        .entries()
        .iter()
        .all(|e| e.is_set || e.val0.is_finite())
}

fn start_value(
    conn: &Connection,
    key: PropKey,
    source: Option<&Component>,
    target: Option<&Component>,
    mode: SolveMode,
) -> f64 {
    let c = conn.prop(key);
    let design = (mode == SolveMode::Offdesign && c.design.is_finite()).then_some(c.design);
    c.start_si()
        .or_else(|| source.and_then(|s| s.start_value(Side::Outlet, key)))
        .or_else(|| target.and_then(|t| t.start_value(Side::Inlet, key)))
        .or(design)
        .unwrap_or_else(|| match key {
            PropKey::M => DEFAULT_MASS_FLOW,
            PropKey::P => DEFAULT_PRESSURE,
            _ => mixture::h_mix_pt(conn.p.val_si, DEFAULT_TEMPERATURE, &conn.fluid_data())
                .ok()
                .filter(|h| h.is_finite())
                .unwrap_or(DEFAULT_ENTHALPY),
        })
}

impl Network {
    pub(crate) fn init_starting_values(&mut self, mode: SolveMode) -> SolverResult<()> {
        self.propagate_fluids()?;

        let ids: Vec<ConnId> = self.connections.iter().map(|(id, _)| id).collect();
        for id in ids {
            let conn = self.connections.get(id)?;
            let source = self.components.get(conn.source().comp.slot());
            let target = self.components.get(conn.target().comp.slot());
            let mut values = Vec::new();
            // h falls back on h(p, T), so p goes first
            for key in [PropKey::M, PropKey::P] {
                if !conn.prop(key).is_set {
                    values.push((key, start_value(conn, key, source, target, mode)));
                }
            }
            let conn = self.connections.get_mut(id)?;
            for (key, v) in values {
                conn.prop_mut(key).val_si = v;
            }
            if !conn.h.is_set {
                let conn_ref: &Connection = conn;
                let h = start_value(conn_ref, PropKey::H, source, target, mode);
                conn.h.val_si = h;
            }
        }
        Ok(())
    }

    fn propagate_fluids(&mut self) -> SolverResult<()> {
        let mut known = Vec::with_capacity(self.connections.len());
        for (_, conn) in self.connections.iter_mut() {
            let starts: Vec<(usize, f64)> = conn
                .fluid()
                .entries()
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.is_set && e.val0.is_finite())
                .map(|(i, e)| (i, e.val0))
                .collect();
            for (i, y) in starts {
                conn.fluid_mut().set_value(i, y);
            }
            known.push(composition_known(conn));
        }

        loop {
            let mut changed = false;
            for comp in &self.components {
                let ids: Vec<ConnId> = comp
                    .inlets()
                    .unwrap_or_default()
                    .into_iter()
                    .chain(comp.outlets().unwrap_or_default())
                    .collect();
                let Some(&from) = ids.iter().find(|id| known[id.slot()]) else {
                    continue;
                };
                let values = self.connections.get(from)?.fluid().values();
                let pending: Vec<ConnId> =
                    ids.iter().copied().filter(|id| !known[id.slot()]).collect();
                for id in pending {
                    let fluid = self.connections.get_mut(id)?.fluid_mut();
                    let free: Vec<usize> = fluid.free_indices().collect();
                    for i in free {
                        fluid.set_value(i, values[i]);
                    }
                    known[id.slot()] = true;
                    changed = true;
                    debug!(connection = id.index(), component = %comp.label(), "fluid composition propagated");
                }
            }
            if !changed {
                break;
            }
        }

        for (_, conn) in self.connections.iter_mut() {
            conn.fluid_mut().normalize();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tn_components::ComponentKind;
    use tn_fluids::{FluidRegistry, IdealGasWrapper};
    use tn_graph::ConnectionAttr;

    #[test]
    fn composition_spreads_along_a_chain_of_components() {
        let registry = FluidRegistry::new()
            .with(IdealGasWrapper::nitrogen())
            .with(IdealGasWrapper::oxygen());
        let mut nw = Network::new(Arc::new(registry), &["N2", "O2"]).unwrap();
        let so = nw.add_component("source", ComponentKind::Source).unwrap();
        let v1 = nw.add_component("v1", ComponentKind::Valve).unwrap();
        let v2 = nw.add_component("v2", ComponentKind::Valve).unwrap();
        let si = nw.add_component("sink", ComponentKind::Sink).unwrap();
        let c1 = nw.connect("c1", so, "out1", v1, "in1").unwrap();
        let c2 = nw.connect("c2", v1, "out1", v2, "in1").unwrap();
        let c3 = nw.connect("c3", v2, "out1", si, "in1").unwrap();
        nw.set_conn_attr(c1, [ConnectionAttr::fluid([("N2", 0.7), ("O2", 0.3)])])
            .unwrap();

        nw.propagate_fluids().unwrap();
        for id in [c2, c3] {
            let values = nw.connection(id).unwrap().fluid().values();
            assert!((values[0] - 0.7).abs() < 1e-12, "{values:?}");
            assert!((values[1] - 0.3).abs() < 1e-12, "{values:?}");
        }
    }
}
