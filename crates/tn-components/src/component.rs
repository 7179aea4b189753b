//! The component vertex: kind, connectors, parameters and equation layout.

use std::collections::BTreeMap;

use tn_core::{ConnId, ERR};
use tn_graph::{ConnectionRegistry, EquationLedger, FluidFraction, PropKey, SolveContext};
use tracing::debug;

use crate::characteristics::DpCharacteristic;
use crate::common::Port;
use crate::equations::ComponentEquation;
use crate::error::{ComponentError, ComponentResult};
use crate::params::{ParamContainer, ParamKey, ParamSpec};

/// Closed catalogue of component models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Source,
    Sink,
    /// Isenthalpic throttle.
    Valve,
    Merge { num_in: usize },
    Splitter { num_out: usize },
    /// Single stream exchanging heat with its surroundings.
    SimpleHeatExchanger,
    Compressor,
    Pump,
    Turbine,
}

impl ComponentKind {
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Source => "source",
            ComponentKind::Sink => "sink",
            ComponentKind::Valve => "valve",
            ComponentKind::Merge { .. } => "merge",
            ComponentKind::Splitter { .. } => "splitter",
            ComponentKind::SimpleHeatExchanger => "simple heat exchanger",
            ComponentKind::Compressor => "compressor",
            ComponentKind::Pump => "pump",
            ComponentKind::Turbine => "turbine",
        }
    }

    pub fn num_inlets(self) -> usize {
        match self {
            ComponentKind::Source => 0,
            ComponentKind::Merge { num_in } => num_in,
            _ => 1,
        }
    }

    pub fn num_outlets(self) -> usize {
        match self {
            ComponentKind::Sink => 0,
            ComponentKind::Splitter { num_out } => num_out,
            _ => 1,
        }
    }

    pub fn is_turbomachine(self) -> bool {
        matches!(
            self,
            ComponentKind::Compressor | ComponentKind::Pump | ComponentKind::Turbine
        )
    }

    /// Parameters offered by this kind with their admissible ranges.
    fn parameters(self) -> Vec<(ParamKey, ParamContainer)> {
        let pr = |min, max| (ParamKey::Pr, ParamContainer::new(min, max));
        let zeta = (ParamKey::Zeta, ParamContainer::new(0.0, 1e15));
        let eta = (ParamKey::EtaS, ParamContainer::new(0.0, 1.0));
        let power = (ParamKey::P, ParamContainer::unbounded());
        match self {
            ComponentKind::Valve => vec![pr(1e-4, 1.0), zeta],
            ComponentKind::SimpleHeatExchanger => vec![
                (ParamKey::Q, ParamContainer::unbounded()),
                pr(1e-4, 1.0),
                zeta,
                (ParamKey::KA, ParamContainer::new(0.0, 1e15)),
                (ParamKey::Tamb, ParamContainer::new(0.0, f64::INFINITY)),
            ],
            ComponentKind::Compressor | ComponentKind::Pump => vec![power, pr(1.0, 1e6), eta],
            ComponentKind::Turbine => vec![power, pr(1e-6, 1.0), eta],
            _ => Vec::new(),
        }
    }

    /// Equations that are always active.
    fn mandatory(self) -> &'static [ComponentEquation] {
        use ComponentEquation::*;
        match self {
            ComponentKind::Source | ComponentKind::Sink => &[],
            ComponentKind::Valve => &[MassFlow, FluidEquality, EnthalpyEquality],
            ComponentKind::Merge { .. } => &[MassFlow, FluidMixing, EnergyBalance, PressureEquality],
            ComponentKind::Splitter { .. } => {
                &[MassFlow, FluidEquality, EnthalpyEquality, PressureEquality]
            }
            ComponentKind::SimpleHeatExchanger
            | ComponentKind::Compressor
            | ComponentKind::Pump
            | ComponentKind::Turbine => &[MassFlow, FluidEquality],
        }
    }
}

/// Which end of a component a connection is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Inlet,
    Outlet,
}

/// One typed attribute assignment of a component.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentAttr {
    Param(ParamKey, ParamSpec),
    /// Pressure drop characteristic of a valve; `None` removes it.
    DpChar(Option<DpCharacteristic>),
    Design(Vec<ParamKey>),
    Offdesign(Vec<ParamKey>),
    LocalDesign(bool),
    LocalOffdesign(bool),
    Printout(bool),
}

impl ComponentAttr {
    pub fn param(key: ParamKey, spec: impl Into<ParamSpec>) -> Self {
        ComponentAttr::Param(key, spec.into())
    }
}

#[derive(Clone, Debug)]
pub struct Component {
    label: String,
    kind: ComponentKind,
    params: BTreeMap<ParamKey, ParamContainer>,
    dp_char: Option<DpCharacteristic>,
    inlets: Vec<Option<ConnId>>,
    outlets: Vec<Option<ConnId>>,
    pub(crate) design: Vec<ParamKey>,
    pub(crate) offdesign: Vec<ParamKey>,
    pub(crate) local_design: bool,
    pub(crate) local_offdesign: bool,
    pub(crate) printout: bool,
    num_fluids: usize,
    /// `(outlet, substance)` pairs carrying a fraction equality row.
    pub(crate) fluid_rows: Vec<(usize, usize)>,
    equations: Vec<(ComponentEquation, usize)>,
}

impl Component {
    pub fn new(label: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            label: label.into(),
            kind,
            params: kind.parameters().into_iter().collect(),
            dp_char: None,
            inlets: vec![None; kind.num_inlets()],
            outlets: vec![None; kind.num_outlets()],
            design: Vec::new(),
            offdesign: Vec::new(),
            local_design: false,
            local_offdesign: false,
            printout: true,
            num_fluids: 0,
            fluid_rows: Vec::new(),
            equations: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Connector ids `in1..inN`.
    pub fn inlet_ids(&self) -> Vec<String> {
        (1..=self.inlets.len()).map(|i| format!("in{i}")).collect()
    }

    /// Connector ids `out1..outN`.
    pub fn outlet_ids(&self) -> Vec<String> {
        (1..=self.outlets.len()).map(|i| format!("out{i}")).collect()
    }

    /// Bind connection `conn` to connector `id` on `side`.
    pub fn attach(&mut self, side: Side, id: &str, conn: ConnId) -> ComponentResult<()> {
        let (prefix, slots) = match side {
            Side::Inlet => ("in", &mut self.inlets),
            Side::Outlet => ("out", &mut self.outlets),
        };
        let slot = id
            .strip_prefix(prefix)
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| slots.get_mut(i))
            .ok_or_else(|| {
                ComponentError::config(format!(
                    "'{id}' is not a connector of component '{}'",
                    self.label
                ))
            })?;
        *slot = Some(conn);
        Ok(())
    }

    pub fn inlets(&self) -> ComponentResult<Vec<ConnId>> {
        self.bound(&self.inlets, "in")
    }

    pub fn outlets(&self) -> ComponentResult<Vec<ConnId>> {
        self.bound(&self.outlets, "out")
    }

    fn bound(&self, slots: &[Option<ConnId>], prefix: &str) -> ComponentResult<Vec<ConnId>> {
        slots
            .iter()
            .enumerate()
            .map(|(i, c)| {
                c.ok_or_else(|| ComponentError::Unconnected {
                    component: self.label.clone(),
                    connector: format!("{prefix}{}", i + 1),
                })
            })
            .collect()
    }

    pub fn param(&self, key: ParamKey) -> Option<&ParamContainer> {
        self.params.get(&key)
    }

    pub fn param_mut(&mut self, key: ParamKey) -> Option<&mut ParamContainer> {
        self.params.get_mut(&key)
    }

    pub fn params(&self) -> impl Iterator<Item = (ParamKey, &ParamContainer)> {
        self.params.iter().map(|(k, p)| (*k, p))
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = (ParamKey, &mut ParamContainer)> {
        self.params.iter_mut().map(|(k, p)| (*k, p))
    }

    pub fn dp_char(&self) -> Option<&DpCharacteristic> {
        self.dp_char.as_ref()
    }

    /// Current value of a parameter, NaN if the kind does not offer it.
    pub fn value(&self, key: ParamKey) -> f64 {
        self.params.get(&key).map_or(f64::NAN, |p| p.val)
    }

    fn offered(&self, key: ParamKey) -> ComponentResult<()> {
        if self.params.contains_key(&key) {
            Ok(())
        } else {
            Err(ComponentError::config(format!(
                "a {} has no parameter '{key}'",
                self.kind.name()
            )))
        }
    }

    pub fn design_keys(&self) -> &[ParamKey] {
        &self.design
    }

    pub fn offdesign_keys(&self) -> &[ParamKey] {
        &self.offdesign
    }

    pub fn local_design(&self) -> bool {
        self.local_design
    }

    pub fn local_offdesign(&self) -> bool {
        self.local_offdesign
    }

    pub fn printout(&self) -> bool {
        self.printout
    }

    /// Apply attributes atomically: on error the component is unchanged.
    pub fn set_attr(&mut self, attrs: impl IntoIterator<Item = ComponentAttr>) -> ComponentResult<()> {
        let mut next = self.clone();
        for attr in attrs {
            next.apply(attr)?;
        }
        *self = next;
        Ok(())
    }

    fn apply(&mut self, attr: ComponentAttr) -> ComponentResult<()> {
        match attr {
            ComponentAttr::Param(key, spec) => {
                self.offered(key)?;
                if key == ParamKey::Tamb && spec == ParamSpec::Var {
                    return Err(ComponentError::config(
                        "ambient temperature cannot be a variable",
                    ));
                }
                if let Some(p) = self.params.get_mut(&key) {
                    p.apply(key, spec)?;
                }
            }
            ComponentAttr::DpChar(dp_char) => {
                if dp_char.is_some() && self.kind != ComponentKind::Valve {
                    return Err(ComponentError::config(format!(
                        "a {} has no pressure drop characteristic",
                        self.kind.name()
                    )));
                }
                self.dp_char = dp_char;
            }
            ComponentAttr::Design(keys) => {
                keys.iter().try_for_each(|k| self.offered(*k))?;
                self.design = keys;
            }
            ComponentAttr::Offdesign(keys) => {
                keys.iter().try_for_each(|k| self.offered(*k))?;
                self.offdesign = keys;
            }
            ComponentAttr::LocalDesign(b) => self.local_design = b,
            ComponentAttr::LocalOffdesign(b) => self.local_offdesign = b,
            ComponentAttr::Printout(b) => self.printout = b,
        }
        Ok(())
    }

    /// String-keyed parameter entry point: `"var"` frees the parameter as
    /// an unknown, `"none"` unsets it, anything else must be a number.
    pub fn set_param_by_name(&mut self, key: &str, value: &str) -> ComponentResult<()> {
        let key: ParamKey = key.parse()?;
        let spec = match value {
            "var" => ParamSpec::Var,
            "none" => ParamSpec::Free,
            v => ParamSpec::Value(v.parse().map_err(|_| {
                ComponentError::config(format!("'{v}' is not a number, 'var' or 'none'"))
            })?),
        };
        self.set_attr([ComponentAttr::Param(key, spec)])
    }

    /// Remember the current parameter values as design values.
    pub fn record_design(&mut self) {
        for p in self.params.values_mut() {
            p.design = p.val;
        }
    }

    /// Fix `key` at its design value.
    pub fn fix_at_design(&mut self, key: ParamKey) -> ComponentResult<()> {
        self.offered(key)?;
        let label = self.label.clone();
        if let Some(p) = self.params.get_mut(&key) {
            if !p.design.is_finite() {
                return Err(ComponentError::config(format!(
                    "no design value for '{key}' at component '{label}'"
                )));
            }
            let design = p.design;
            p.apply(key, ParamSpec::Value(design))?;
        }
        Ok(())
    }

    /// Unset `key` without touching its value.
    pub fn release(&mut self, key: ParamKey) -> ComponentResult<()> {
        self.offered(key)?;
        if let Some(p) = self.params.get_mut(&key) {
            p.apply(key, ParamSpec::Free)?;
        }
        Ok(())
    }

    /// Starting value this component suggests for a connection attached on
    /// `side`, SI.
    pub fn start_value(&self, side: Side, key: PropKey) -> Option<f64> {
        let (p, h) = match (self.kind, side) {
            (ComponentKind::Valve, Side::Inlet) => (5e5, 5e5),
            (ComponentKind::Valve, Side::Outlet) => (4e5, 5e5),
            (ComponentKind::Compressor, Side::Inlet) => (1e5, 4e5),
            (ComponentKind::Compressor, Side::Outlet) => (1e6, 6e5),
            (ComponentKind::Pump, Side::Inlet) => (1e5, 2.9e5),
            (ComponentKind::Pump, Side::Outlet) => (1e6, 3e5),
            (ComponentKind::Turbine, Side::Inlet) => (2.5e6, 2e6),
            (ComponentKind::Turbine, Side::Outlet) => (5e4, 1.5e6),
            (ComponentKind::SimpleHeatExchanger, _) => (1e5, 5e5),
            _ => return None,
        };
        match key {
            PropKey::P => Some(p),
            PropKey::H => Some(h),
            _ => None,
        }
    }

    /// Select the active equations; returns the row count. `num_fluids` is
    /// the size of the network's declared substance set.
    pub fn preprocess(
        &mut self,
        num_fluids: usize,
        connections: &ConnectionRegistry,
    ) -> ComponentResult<usize> {
        self.inlets()?;
        self.outlets()?;
        self.num_fluids = num_fluids;
        self.fluid_rows = if self.kind.mandatory().contains(&ComponentEquation::FluidEquality) {
            self.fluid_equality_rows(connections)?
        } else {
            Vec::new()
        };
        self.equations.clear();
        for &eq in self.kind.mandatory() {
            let rows = eq.rows(self);
            self.equations.push((eq, rows));
        }

        let set = |k: ParamKey| self.params.get(&k).is_some_and(|p| p.is_set);
        let mut optional = Vec::new();
        for (key, eq) in [
            (ParamKey::Pr, ComponentEquation::PressureRatio),
            (ParamKey::Zeta, ComponentEquation::Zeta),
            (ParamKey::Q, ComponentEquation::HeatFlow),
            (ParamKey::P, ComponentEquation::Power),
            (ParamKey::EtaS, ComponentEquation::IsentropicEfficiency),
        ] {
            if set(key) {
                optional.push(eq);
            }
        }
        match (set(ParamKey::KA), set(ParamKey::Tamb)) {
            (true, true) => optional.push(ComponentEquation::KaGroup),
            (true, false) | (false, true) => debug!(
                component = %self.label,
                "kA and Tamb are only used together, the heat transfer group is inactive"
            ),
            (false, false) => {}
        }
        if self.dp_char.is_some() {
            optional.push(ComponentEquation::DpChar);
        }
        for eq in optional {
            self.equations.push((eq, 1));
        }
        Ok(self.equations.iter().map(|(_, n)| n).sum())
    }

    /// A fraction fixed at both the inlet and an outlet needs no equality
    /// row, but the two values have to agree.
    fn fluid_equality_rows(
        &self,
        connections: &ConnectionRegistry,
    ) -> ComponentResult<Vec<(usize, usize)>> {
        let inlet = self.inlets.first().copied().flatten();
        let mut rows = Vec::new();
        for (j, &outlet) in self.outlets.iter().enumerate() {
            for k in 0..self.num_fluids {
                match (
                    fixed_fraction(connections, inlet, k),
                    fixed_fraction(connections, outlet, k),
                ) {
                    (Some(a), Some(b)) if (a.val - b.val).abs() > ERR => {
                        return Err(ComponentError::config(format!(
                            "component '{}' joins connections with fixed '{}' fractions {} and {}",
                            self.label, a.name, a.val, b.val
                        )));
                    }
                    (Some(_), Some(_)) => {}
                    _ => rows.push((j, k)),
                }
            }
        }
        Ok(rows)
    }

    pub fn num_fluids(&self) -> usize {
        self.num_fluids
    }

    pub fn equations(&self) -> &[(ComponentEquation, usize)] {
        &self.equations
    }

    /// Parameters that are unknowns of the Newton system.
    pub fn variable_params(&self) -> impl Iterator<Item = ParamKey> + '_ {
        self.params
            .iter()
            .filter(|(_, p)| p.is_set && p.is_var)
            .map(|(k, _)| *k)
    }

    pub(crate) fn ports<'a>(
        &self,
        ctx: &SolveContext<'a>,
    ) -> ComponentResult<(Vec<Port<'a>>, Vec<Port<'a>>)> {
        let inl = self
            .inlets()?
            .into_iter()
            .map(|id| Port::resolve(id, ctx))
            .collect::<ComponentResult<Vec<_>>>()?;
        let outl = self
            .outlets()?
            .into_iter()
            .map(|id| Port::resolve(id, ctx))
            .collect::<ComponentResult<Vec<_>>>()?;
        Ok((inl, outl))
    }

    /// Evaluate every active equation into rows `row0..`.
    pub fn solve(
        &self,
        ctx: &SolveContext<'_>,
        row0: usize,
        ledger: &mut EquationLedger,
    ) -> ComponentResult<()> {
        let (inl, outl) = self.ports(ctx)?;
        let mut row = row0;
        for &(eq, rows) in &self.equations {
            eq.evaluate(self, &inl, &outl, row, ledger)?;
            row += rows;
        }
        Ok(())
    }
}

fn fixed_fraction(
    connections: &ConnectionRegistry,
    id: Option<ConnId>,
    k: usize,
) -> Option<&FluidFraction> {
    let conn = connections.get(id?).ok()?;
    conn.fluid().entries().get(k).filter(|e| e.is_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristics::{CharLine, CharParam};

    #[test]
    fn connectors_follow_kind_arity() {
        let merge = Component::new("m", ComponentKind::Merge { num_in: 3 });
        assert_eq!(merge.inlet_ids(), vec!["in1", "in2", "in3"]);
        assert_eq!(merge.outlet_ids(), vec!["out1"]);
        assert!(Component::new("so", ComponentKind::Source).inlet_ids().is_empty());
    }

    #[test]
    fn attach_rejects_unknown_connectors() {
        let mut v = Component::new("v", ComponentKind::Valve);
        let id = ConnId::from_index(0);
        assert!(v.attach(Side::Inlet, "in1", id).is_ok());
        assert!(v.attach(Side::Inlet, "in2", id).is_err());
        assert!(v.attach(Side::Outlet, "in1", id).is_err());
        assert!(v.attach(Side::Outlet, "out0", id).is_err());
        assert!(matches!(
            v.outlets(),
            Err(ComponentError::Unconnected { .. })
        ));
    }

    #[test]
    fn parameters_are_checked_against_kind() {
        let mut v = Component::new("v", ComponentKind::Valve);
        assert!(v.set_attr([ComponentAttr::param(ParamKey::EtaS, 0.8)]).is_err());
        v.set_param_by_name("pr", "0.5").unwrap();
        assert_eq!(v.value(ParamKey::Pr), 0.5);
        v.set_param_by_name("zeta", "var").unwrap();
        assert_eq!(v.variable_params().collect::<Vec<_>>(), vec![ParamKey::Zeta]);
        assert!(v.set_param_by_name("pr", "half").is_err());
        assert_eq!(v.value(ParamKey::Pr), 0.5);
    }

    #[test]
    fn row_count_covers_mandatory_and_active_parameters() {
        let none = ConnectionRegistry::new();
        let mut v = Component::new("v", ComponentKind::Valve);
        v.attach(Side::Inlet, "in1", ConnId::from_index(0)).unwrap();
        v.attach(Side::Outlet, "out1", ConnId::from_index(1)).unwrap();
        // mass, two fluids, enthalpy
        assert_eq!(v.preprocess(2, &none).unwrap(), 4);
        v.set_attr([ComponentAttr::param(ParamKey::Pr, 0.5)]).unwrap();
        assert_eq!(v.preprocess(2, &none).unwrap(), 5);

        let mut s = Component::new("s", ComponentKind::Splitter { num_out: 2 });
        s.attach(Side::Inlet, "in1", ConnId::from_index(0)).unwrap();
        s.attach(Side::Outlet, "out1", ConnId::from_index(1)).unwrap();
        s.attach(Side::Outlet, "out2", ConnId::from_index(2)).unwrap();
        // mass, 2 x 1 fluid, 2 enthalpy, 2 pressure
        assert_eq!(s.preprocess(1, &none).unwrap(), 7);
    }

    #[test]
    fn only_valves_take_a_pressure_drop_characteristic() {
        let none = ConnectionRegistry::new();
        let dp = DpCharacteristic::new(
            CharLine::new(vec![0.0, 1.0], vec![0.0, 1e5]).unwrap(),
            CharParam::MassFlow,
        );
        let mut pump = Component::new("p", ComponentKind::Pump);
        assert!(pump.set_attr([ComponentAttr::DpChar(Some(dp.clone()))]).is_err());
        assert!(pump.dp_char().is_none());

        let mut v = Component::new("v", ComponentKind::Valve);
        v.attach(Side::Inlet, "in1", ConnId::from_index(0)).unwrap();
        v.attach(Side::Outlet, "out1", ConnId::from_index(1)).unwrap();
        v.set_attr([ComponentAttr::DpChar(Some(dp))]).unwrap();
        assert_eq!(v.preprocess(1, &none).unwrap(), 4);
        assert_eq!(v.equations().last().unwrap().0, ComponentEquation::DpChar);
        v.set_attr([ComponentAttr::DpChar(None)]).unwrap();
        assert_eq!(v.preprocess(1, &none).unwrap(), 3);
    }

    #[test]
    fn heat_transfer_group_needs_both_members() {
        let none = ConnectionRegistry::new();
        let mut hx = Component::new("hx", ComponentKind::SimpleHeatExchanger);
        hx.attach(Side::Inlet, "in1", ConnId::from_index(0)).unwrap();
        hx.attach(Side::Outlet, "out1", ConnId::from_index(1)).unwrap();
        hx.set_attr([ComponentAttr::param(ParamKey::KA, 50.0)]).unwrap();
        assert_eq!(hx.preprocess(1, &none).unwrap(), 2);
        hx.set_attr([ComponentAttr::param(ParamKey::Tamb, 293.15)])
            .unwrap();
        assert_eq!(hx.preprocess(1, &none).unwrap(), 3);
        assert!(hx
            .set_attr([ComponentAttr::Param(ParamKey::Tamb, ParamSpec::Var)])
            .is_err());
    }

    #[test]
    fn design_values_can_be_fixed_later() {
        let mut v = Component::new("v", ComponentKind::Valve);
        assert!(v.fix_at_design(ParamKey::Zeta).is_err());
        v.param_mut(ParamKey::Zeta).unwrap().val = 1234.0;
        v.record_design();
        v.fix_at_design(ParamKey::Zeta).unwrap();
        let zeta = v.param(ParamKey::Zeta).unwrap();
        assert!(zeta.is_set && !zeta.is_var);
        assert_eq!(zeta.val, 1234.0);
        v.release(ParamKey::Zeta).unwrap();
        assert!(!v.param(ParamKey::Zeta).unwrap().is_set);
    }
}
