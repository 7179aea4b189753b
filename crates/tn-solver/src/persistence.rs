//! JSON-ready snapshot of a network's specification and results.
//!
//! Connections and components are keyed by label so a snapshot can be
//! loaded into a freshly built network of the same topology.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tn_components::{Component, ComponentAttr, DpCharacteristic, ParamKey, ParamSpec};
use tn_graph::ConnectionState;

use crate::error::{SolverError, SolverResult};
use crate::network::Network;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamState {
    pub val: Option<f64>,
    pub is_set: bool,
    #[serde(default)]
    pub is_var: bool,
    #[serde(default)]
    pub design: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub kind: String,
    pub params: BTreeMap<ParamKey, ParamState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp_char: Option<DpCharacteristic>,
    #[serde(default)]
    pub design: Vec<ParamKey>,
    #[serde(default)]
    pub offdesign: Vec<ParamKey>,
    #[serde(default)]
    pub local_design: bool,
    #[serde(default)]
    pub local_offdesign: bool,
    #[serde(default = "yes")]
    pub printout: bool,
}

fn yes() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusState {
    pub target: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub connections: BTreeMap<String, ConnectionState>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentState>,
    #[serde(default)]
    pub buses: BTreeMap<String, BusState>,
}

impl NetworkState {
    pub fn to_json(&self) -> SolverResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SolverResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn component_state(comp: &Component) -> ComponentState {
    ComponentState {
        kind: comp.kind().name().to_string(),
        params: comp
            .params()
            .map(|(key, p)| {
                (
                    key,
                    ParamState {
                        val: finite(p.val),
                        is_set: p.is_set,
                        is_var: p.is_var,
                        design: finite(p.design),
                    },
                )
            })
            .collect(),
        dp_char: comp.dp_char().cloned(),
        design: comp.design_keys().to_vec(),
        offdesign: comp.offdesign_keys().to_vec(),
        local_design: comp.local_design(),
        local_offdesign: comp.local_offdesign(),
        printout: comp.printout(),
    }
}

fn apply_component_state(comp: &mut Component, state: &ComponentState) -> SolverResult<()> {
    if comp.kind().name() != state.kind {
        return Err(SolverError::config(format!(
            "component '{}' is a {}, the snapshot describes a {}",
            comp.label(),
            comp.kind().name(),
            state.kind
        )));
    }
    let mut attrs = vec![
        ComponentAttr::DpChar(state.dp_char.clone()),
        ComponentAttr::Design(state.design.clone()),
        ComponentAttr::Offdesign(state.offdesign.clone()),
        ComponentAttr::LocalDesign(state.local_design),
        ComponentAttr::LocalOffdesign(state.local_offdesign),
        ComponentAttr::Printout(state.printout),
    ];
    for (&key, ps) in &state.params {
        let spec = match (ps.is_set, ps.is_var, ps.val) {
            (false, _, _) => ParamSpec::Free,
            (true, true, _) => ParamSpec::Var,
            (true, false, Some(v)) => ParamSpec::Value(v),
            (true, false, None) => {
                return Err(SolverError::config(format!(
                    "'{key}' of component '{}' is marked as set but has no value",
                    comp.label()
                )));
            }
        };
        attrs.push(ComponentAttr::Param(key, spec));
    }

    let mut next = comp.clone();
    for (&key, ps) in &state.params {
        let label = next.label().to_string();
        let p = next.param_mut(key).ok_or_else(|| {
            SolverError::config(format!("component '{label}' has no parameter '{key}'"))
        })?;
        p.val = ps.val.unwrap_or(f64::NAN);
        p.design = ps.design.unwrap_or(f64::NAN);
    }
    next.set_attr(attrs)?;
    *comp = next;
    Ok(())
}

impl Network {
    /// Snapshot of every connection, component and bus.
    pub fn state(&self) -> SolverResult<NetworkState> {
        let mut state = NetworkState::default();
        for (id, conn) in self.connections.iter() {
            let source = self.comp_label(conn.source().comp)?;
            let target = self.comp_label(conn.target().comp)?;
            state.connections.insert(
                conn.label().to_string(),
                self.connections.state_of(id, source, target)?,
            );
        }
        for comp in &self.components {
            state
                .components
                .insert(comp.label().to_string(), component_state(comp));
        }
        for bus in &self.buses {
            state.buses.insert(
                bus.label().to_string(),
                BusState {
                    target: bus.target(),
                    value: finite(bus.value()),
                },
            );
        }
        Ok(state)
    }

    /// Restore a snapshot into this network. Every label in the snapshot
    /// must exist here; on error nothing is changed.
    pub fn apply_state(&mut self, state: &NetworkState) -> SolverResult<()> {
        let mut connections = self.connections.clone();
        for (label, cs) in &state.connections {
            let id = connections.id_of(label)?;
            let conn = connections.get(id)?;
            let (source, target) = (
                self.comp_label(conn.source().comp)?,
                self.comp_label(conn.target().comp)?,
            );
            if source != cs.source || target != cs.target {
                return Err(SolverError::config(format!(
                    "connection '{label}' runs from '{source}' to '{target}', \
                     the snapshot has '{}' to '{}'",
                    cs.source, cs.target
                )));
            }
            connections.apply_state(id, cs)?;
        }

        let mut components = self.components.clone();
        for (label, cs) in &state.components {
            let id = self.comp_id(label)?;
            if let Some(comp) = components.get_mut(id.slot()) {
                apply_component_state(comp, cs)?;
            }
        }

        let mut buses = self.buses.clone();
        for (label, bs) in &state.buses {
            let id = self.bus_id(label)?;
            if let Some(bus) = buses.get_mut(id.slot()) {
                bus.set_target(bs.target)?;
            }
        }

        self.connections = connections;
        self.components = components;
        self.buses = buses;
        Ok(())
    }

    /// Supply the design point for following offdesign runs.
    pub fn load_design_state(&mut self, state: NetworkState) -> SolverResult<()> {
        for label in state.connections.keys() {
            self.conn_id(label)?;
        }
        for label in state.components.keys() {
            self.comp_id(label)?;
        }
        self.design_state = Some(state);
        Ok(())
    }

    /// Design point recorded by the last converged design run or loaded by
    /// [`Network::load_design_state`].
    pub fn design_state(&self) -> Option<&NetworkState> {
        self.design_state.as_ref()
    }

    /// Copy the design values of `state` into the containers' design slots.
    pub(crate) fn load_design_values(&mut self, state: &NetworkState) -> SolverResult<()> {
        for (label, cs) in &state.connections {
            let id = self.connections.id_of(label)?;
            let conn = self.connections.get_mut(id)?;
            for (&key, ps) in &cs.properties {
                conn.prop_mut(key).design = ps.val_si.unwrap_or(f64::NAN);
            }
        }
        for (label, cs) in &state.components {
            let id = self.comp_id(label)?;
            if let Some(comp) = self.components.get_mut(id.slot()) {
                for (&key, ps) in &cs.params {
                    if let Some(p) = comp.param_mut(key) {
                        p.design = ps.val.unwrap_or(f64::NAN);
                    }
                }
            }
        }
        Ok(())
    }
}
