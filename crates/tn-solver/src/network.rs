//! The network: owner of connections, components and buses.

use std::collections::BTreeMap;
use std::sync::Arc;

use tn_components::{Component, ComponentAttr, ComponentKind, ExergyBalance, Side};
use tn_core::{BusId, CompId, ConnId, UnitSystem};
use tn_fluids::FluidRegistry;
use tn_graph::{
    AttrValue, Connection, ConnectionAttr, ConnectionRegistry, Connector, unconnected,
    validate_connectors,
};
use tracing::debug;

use crate::bus::{Bus, BusBase};
use crate::error::{SolverError, SolverResult};
use crate::newton::NewtonConfig;
use crate::persistence::NetworkState;

pub struct Network {
    registry: Arc<FluidRegistry>,
    fluids: Vec<String>,
    units: UnitSystem,
    config: NewtonConfig,
    pub(crate) connections: ConnectionRegistry,
    pub(crate) components: Vec<Component>,
    comp_labels: BTreeMap<String, CompId>,
    pub(crate) buses: Vec<Bus>,
    bus_labels: BTreeMap<String, BusId>,
    /// Snapshot of the last converged design run, or one loaded by the user.
    pub(crate) design_state: Option<NetworkState>,
}

impl Network {
    /// Create an empty network over the declared substance set; every name
    /// must be registered with `registry`.
    pub fn new<S: AsRef<str>>(registry: Arc<FluidRegistry>, fluids: &[S]) -> SolverResult<Self> {
        if fluids.is_empty() {
            return Err(SolverError::config("a network needs at least one fluid"));
        }
        let mut names: Vec<String> = Vec::with_capacity(fluids.len());
        for name in fluids.iter().map(AsRef::as_ref) {
            if !registry.contains(name) {
                return Err(SolverError::config(format!(
                    "fluid '{name}' is not registered"
                )));
            }
            if names.iter().any(|n| n == name) {
                return Err(SolverError::config(format!("fluid '{name}' declared twice")));
            }
            names.push(name.to_string());
        }
        Ok(Self {
            registry,
            fluids: names,
            units: UnitSystem::default(),
            config: NewtonConfig::default(),
            connections: ConnectionRegistry::new(),
            components: Vec::new(),
            comp_labels: BTreeMap::new(),
            buses: Vec::new(),
            bus_labels: BTreeMap::new(),
            design_state: None,
        })
    }

    /// Units for connections created afterwards.
    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_config(mut self, config: NewtonConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: NewtonConfig) {
        self.config = config;
    }

    pub fn fluids(&self) -> &[String] {
        &self.fluids
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    // ---- components ----

    pub fn add_component(
        &mut self,
        label: impl Into<String>,
        kind: ComponentKind,
    ) -> SolverResult<CompId> {
        let label = label.into();
        if self.comp_labels.contains_key(&label) {
            return Err(SolverError::config(format!(
                "a component labelled '{label}' already exists"
            )));
        }
        let id = CompId::from_index(self.components.len() as u32);
        self.comp_labels.insert(label.clone(), id);
        self.components.push(Component::new(label, kind));
        Ok(id)
    }

    pub fn comp_id(&self, label: &str) -> SolverResult<CompId> {
        self.comp_labels
            .get(label)
            .copied()
            .ok_or_else(|| SolverError::config(format!("no component labelled '{label}'")))
    }

    pub fn component(&self, id: CompId) -> SolverResult<&Component> {
        self.components
            .get(id.slot())
            .ok_or_else(|| SolverError::config(format!("component {id} not found")))
    }

    pub fn components(&self) -> impl Iterator<Item = (CompId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (CompId::from_index(i as u32), c))
    }

    fn component_mut(&mut self, id: CompId) -> SolverResult<&mut Component> {
        self.components
            .get_mut(id.slot())
            .ok_or_else(|| SolverError::config(format!("component {id} not found")))
    }

    pub fn set_comp_attr(
        &mut self,
        id: CompId,
        attrs: impl IntoIterator<Item = ComponentAttr>,
    ) -> SolverResult<()> {
        self.component_mut(id)?.set_attr(attrs)?;
        Ok(())
    }

    /// String-keyed parameter entry point, see [`Component::set_param_by_name`].
    pub fn set_comp_param_by_name(&mut self, id: CompId, key: &str, value: &str) -> SolverResult<()> {
        self.component_mut(id)?.set_param_by_name(key, value)?;
        Ok(())
    }

    // ---- connections ----

    /// Connect outlet `outlet` of `source` to inlet `inlet` of `target`.
    pub fn connect(
        &mut self,
        label: impl Into<String>,
        source: CompId,
        outlet: &str,
        target: CompId,
        inlet: &str,
    ) -> SolverResult<ConnId> {
        let label = label.into();
        if self.connections.id_of(&label).is_ok() {
            return Err(SolverError::config(format!(
                "a connection labelled '{label}' already exists"
            )));
        }
        let from = Connector::new(source, outlet);
        let to = Connector::new(target, inlet);
        validate_connectors(
            &self.connections,
            &from,
            &self.component(source)?.outlet_ids(),
            &to,
            &self.component(target)?.inlet_ids(),
        )?;

        let conn = Connection::new(
            label,
            from,
            to,
            &self.units,
            &self.registry,
            &self.fluids,
        )?;
        let id = self.connections.insert(conn)?;
        self.component_mut(source)?.attach(Side::Outlet, outlet, id)?;
        self.component_mut(target)?.attach(Side::Inlet, inlet, id)?;
        debug!(connection = id.index(), source = %source, target = %target, "connected");
        Ok(id)
    }

    pub fn conn_id(&self, label: &str) -> SolverResult<ConnId> {
        Ok(self.connections.id_of(label)?)
    }

    pub fn connection(&self, id: ConnId) -> SolverResult<&Connection> {
        Ok(self.connections.get(id)?)
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Apply connection attributes atomically; references are checked
    /// against the registry.
    pub fn set_conn_attr(
        &mut self,
        id: ConnId,
        attrs: impl IntoIterator<Item = ConnectionAttr>,
    ) -> SolverResult<()> {
        self.connections.set_attr(id, attrs)?;
        Ok(())
    }

    pub fn set_conn_attr_by_name(
        &mut self,
        id: ConnId,
        key: &str,
        value: AttrValue,
    ) -> SolverResult<()> {
        let attr = ConnectionAttr::from_key_value(key, value)?;
        self.set_conn_attr(id, [attr])
    }

    /// Every connector of every component must be in use before solving.
    pub fn check_connectivity(&self) -> SolverResult<()> {
        for (id, comp) in self.components() {
            let mut open = unconnected(&self.connections, id, &comp.inlet_ids(), false);
            open.extend(unconnected(&self.connections, id, &comp.outlet_ids(), true));
            if !open.is_empty() {
                return Err(SolverError::config(format!(
                    "component '{}' has unconnected connectors: {}",
                    comp.label(),
                    open.join(", ")
                )));
            }
        }
        Ok(())
    }

    // ---- buses ----

    pub fn add_bus(&mut self, label: impl Into<String>) -> SolverResult<BusId> {
        let label = label.into();
        if self.bus_labels.contains_key(&label) {
            return Err(SolverError::config(format!(
                "a bus labelled '{label}' already exists"
            )));
        }
        let id = BusId::from_index(self.buses.len() as u32);
        self.bus_labels.insert(label.clone(), id);
        self.buses.push(Bus::new(label));
        Ok(id)
    }

    pub fn bus_id(&self, label: &str) -> SolverResult<BusId> {
        self.bus_labels
            .get(label)
            .copied()
            .ok_or_else(|| SolverError::config(format!("no bus labelled '{label}'")))
    }

    pub fn bus(&self, id: BusId) -> SolverResult<&Bus> {
        self.buses
            .get(id.slot())
            .ok_or_else(|| SolverError::config(format!("bus {id} not found")))
    }

    pub fn bus_mut(&mut self, id: BusId) -> SolverResult<&mut Bus> {
        self.buses
            .get_mut(id.slot())
            .ok_or_else(|| SolverError::config(format!("bus {id} not found")))
    }

    /// Add a component's heat or power to a bus.
    pub fn add_to_bus(
        &mut self,
        bus: BusId,
        comp: CompId,
        weight: f64,
        base: BusBase,
    ) -> SolverResult<()> {
        self.component(comp)?.bus_capable()?;
        self.bus_mut(bus)?.add_component(comp, weight, base)
    }

    // ---- results ----

    /// Entropy generation of every component after a solve, W/K.
    pub fn entropy_generation(&self) -> SolverResult<Vec<(String, f64)>> {
        self.components
            .iter()
            .map(|c| Ok((c.label().to_string(), c.entropy_generation(&self.connections)?)))
            .collect()
    }

    /// Exergy balance of every component against the dead state `(p0, t0)`.
    pub fn exergy_analysis(&self, p0: f64, t0: f64) -> SolverResult<Vec<(String, ExergyBalance)>> {
        self.components
            .iter()
            .map(|c| {
                Ok((
                    c.label().to_string(),
                    c.exergy_balance(&self.connections, p0, t0)?,
                ))
            })
            .collect()
    }

    /// Label of the component at either end of a connection.
    pub(crate) fn comp_label(&self, id: CompId) -> SolverResult<&str> {
        Ok(self.component(id)?.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tn_fluids::{ClausiusClapeyronWrapper, IdealGasWrapper};

    fn network() -> Network {
        let registry = FluidRegistry::new()
            .with(ClausiusClapeyronWrapper::water())
            .with(IdealGasWrapper::nitrogen());
        Network::new(Arc::new(registry), &["water"]).unwrap()
    }

    #[test]
    fn unknown_fluids_are_rejected() {
        let registry = Arc::new(FluidRegistry::new().with(IdealGasWrapper::nitrogen()));
        assert!(Network::new(Arc::clone(&registry), &["R134a"]).is_err());
        assert!(Network::new(Arc::clone(&registry), &["N2", "N2"]).is_err());
        assert!(Network::new(registry, &[] as &[&str]).is_err());
    }

    #[test]
    fn connectors_are_validated_and_attached() {
        let mut nw = network();
        let so = nw.add_component("source", ComponentKind::Source).unwrap();
        let v = nw.add_component("valve", ComponentKind::Valve).unwrap();
        assert!(nw.add_component("valve", ComponentKind::Sink).is_err());

        assert!(nw.connect("c1", so, "out2", v, "in1").is_err());
        assert!(nw.connect("c1", so, "out1", so, "in1").is_err());
        let c1 = nw.connect("c1", so, "out1", v, "in1").unwrap();
        assert!(nw.connect("c1b", so, "out1", v, "in1").is_err());
        assert_eq!(nw.component(v).unwrap().inlets().unwrap(), vec![c1]);

        let err = nw.check_connectivity().unwrap_err();
        assert!(err.to_string().contains("out1"));
    }

    #[test]
    fn only_heat_and_power_join_a_bus() {
        let mut nw = network();
        let v = nw.add_component("valve", ComponentKind::Valve).unwrap();
        let p = nw.add_component("pump", ComponentKind::Pump).unwrap();
        let bus = nw.add_bus("power").unwrap();
        assert!(nw.add_to_bus(bus, v, 1.0, BusBase::Component).is_err());
        nw.add_to_bus(bus, p, 0.95, BusBase::Bus).unwrap();
        assert_eq!(nw.bus(bus).unwrap().entries().len(), 1);
        assert_eq!(nw.bus_id("power").unwrap(), bus);
    }
}
