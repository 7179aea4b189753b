//! Flow connection between two components.
//!
//! A connection owns one container per primary (m, p, h), derived (T, v, x,
//! Td_bp) and output (vol, s) property, the mass fractions of every declared
//! substance and the handles of their property wrappers. Specifications turn
//! into one-row equations in [`Connection::preprocess`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tn_core::{CompId, Unit, UnitSystem};
use tn_fluids::{FluidData, FluidEntry, FluidRegistry, FluidWrapper, MixingRule, mixture};
use tracing::debug;

use crate::attrs::{AttrValue, ConnectionAttr, PhaseState, PropKey, Spec};
use crate::composition::FluidComposition;
use crate::container::PropertyContainer;
use crate::error::{GraphError, GraphResult};
use crate::reference::Reference;

/// Magnitude limit of a free mass flow, kg/s.
pub const MASS_FLOW_LIMIT: f64 = 1e4;

/// One end of a connection: a component and the id of its inlet or outlet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Connector {
    pub comp: CompId,
    pub id: String,
}

impl Connector {
    pub fn new(comp: CompId, id: impl Into<String>) -> Self {
        Self {
            comp,
            id: id.into(),
        }
    }
}

/// Equations a connection contributes, one row each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnEquation {
    /// `T(p, h, y) - T_set`
    Temperature,
    /// `v(p, h, y) · m - V_set`
    VolumetricFlow,
    /// `h - h(p, x_set)`
    VapourFraction,
    /// `T(p, h) - T_sat(p) - Td_bp_set`
    BoilingPointDelta,
    /// `y - (factor · y_ref + delta)`
    Reference(PropKey),
    /// `1 - Σ y_i`
    FluidBalance,
}

#[derive(Clone, Debug)]
pub struct Connection {
    label: String,
    source: Connector,
    target: Connector,
    pub m: PropertyContainer,
    pub p: PropertyContainer,
    pub h: PropertyContainer,
    pub t: PropertyContainer,
    pub v: PropertyContainer,
    pub x: PropertyContainer,
    pub td_bp: PropertyContainer,
    pub vol: PropertyContainer,
    pub s: PropertyContainer,
    pub(crate) references: BTreeMap<PropKey, Reference>,
    pub(crate) fluid: FluidComposition,
    wrappers: Vec<Arc<dyn FluidWrapper>>,
    pub(crate) mixing_rule: MixingRule,
    pub(crate) state: Option<PhaseState>,
    pub(crate) design: Vec<PropKey>,
    pub(crate) offdesign: Vec<PropKey>,
    pub(crate) local_design: bool,
    pub(crate) local_offdesign: bool,
    pub(crate) printout: bool,
    equations: Vec<ConnEquation>,
}

impl Connection {
    /// Create a connection carrying the declared substances `fluids`, each
    /// bound to its wrapper in `registry`.
    pub fn new<S: AsRef<str>>(
        label: impl Into<String>,
        source: Connector,
        target: Connector,
        units: &UnitSystem,
        registry: &FluidRegistry,
        fluids: &[S],
    ) -> GraphResult<Self> {
        let wrappers = fluids
            .iter()
            .map(|name| {
                registry
                    .get(name.as_ref())
                    .map_err(|e| GraphError::config(e.to_string()))
            })
            .collect::<GraphResult<Vec<_>>>()?;
        let (p_min, p_max) = wrappers.iter().fold((f64::MAX, f64::MIN), |(lo, hi), w| {
            let b = w.bounds();
            (lo.min(b.p_min), hi.max(b.p_max))
        });
        let p = if wrappers.is_empty() {
            PropertyContainer::system(units.pressure)
        } else {
            PropertyContainer::system(units.pressure).with_range(p_min, p_max)
        };

        Ok(Self {
            label: label.into(),
            source,
            target,
            m: PropertyContainer::system(units.mass_flow)
                .with_range(-MASS_FLOW_LIMIT, MASS_FLOW_LIMIT),
            p,
            h: PropertyContainer::system(units.enthalpy),
            t: PropertyContainer::new(units.temperature),
            v: PropertyContainer::new(units.volumetric_flow),
            x: PropertyContainer::new(Unit::Dimensionless),
            td_bp: PropertyContainer::difference(units.temperature),
            vol: PropertyContainer::new(units.specific_volume),
            s: PropertyContainer::new(units.entropy),
            references: BTreeMap::new(),
            fluid: FluidComposition::new(fluids),
            wrappers,
            mixing_rule: MixingRule::default(),
            state: None,
            design: Vec::new(),
            offdesign: Vec::new(),
            local_design: false,
            local_offdesign: false,
            printout: true,
            equations: Vec::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &Connector {
        &self.source
    }

    pub fn target(&self) -> &Connector {
        &self.target
    }

    pub fn prop(&self, key: PropKey) -> &PropertyContainer {
        match key {
            PropKey::M => &self.m,
            PropKey::P => &self.p,
            PropKey::H => &self.h,
            PropKey::T => &self.t,
            PropKey::V => &self.v,
            PropKey::X => &self.x,
            PropKey::TdBp => &self.td_bp,
            PropKey::Vol => &self.vol,
            PropKey::S => &self.s,
        }
    }

    pub fn prop_mut(&mut self, key: PropKey) -> &mut PropertyContainer {
        match key {
            PropKey::M => &mut self.m,
            PropKey::P => &mut self.p,
            PropKey::H => &mut self.h,
            PropKey::T => &mut self.t,
            PropKey::V => &mut self.v,
            PropKey::X => &mut self.x,
            PropKey::TdBp => &mut self.td_bp,
            PropKey::Vol => &mut self.vol,
            PropKey::S => &mut self.s,
        }
    }

    pub fn reference(&self, key: PropKey) -> Option<&Reference> {
        self.references.get(&key)
    }

    pub fn references(&self) -> impl Iterator<Item = (PropKey, &Reference)> {
        self.references.iter().map(|(k, r)| (*k, r))
    }

    pub fn fluid(&self) -> &FluidComposition {
        &self.fluid
    }

    pub fn fluid_mut(&mut self) -> &mut FluidComposition {
        &mut self.fluid
    }

    pub fn wrappers(&self) -> &[Arc<dyn FluidWrapper>] {
        &self.wrappers
    }

    pub fn mixing_rule(&self) -> MixingRule {
        self.mixing_rule
    }

    pub fn state(&self) -> Option<PhaseState> {
        self.state
    }

    pub fn design_keys(&self) -> &[PropKey] {
        &self.design
    }

    pub fn offdesign_keys(&self) -> &[PropKey] {
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

    /// Apply attributes atomically: on error the connection is unchanged.
    pub fn set_attr(&mut self, attrs: impl IntoIterator<Item = ConnectionAttr>) -> GraphResult<()> {
        let mut next = self.clone();
        for attr in attrs {
            next.apply(attr)?;
        }
        next.check_overspecification()?;
        *self = next;
        Ok(())
    }

    pub fn set_attr_by_name(&mut self, key: &str, value: AttrValue) -> GraphResult<()> {
        let attr = ConnectionAttr::from_key_value(key, value)?;
        self.set_attr([attr])
    }

    fn apply(&mut self, attr: ConnectionAttr) -> GraphResult<()> {
        match attr {
            ConnectionAttr::Property(key, spec) => {
                if !key.is_specifiable() {
                    return Err(GraphError::config(format!(
                        "'{key}' is a result and cannot be specified"
                    )));
                }
                match spec {
                    Spec::Value(v) => {
                        if key == PropKey::X && !(0.0..=1.0).contains(&v) {
                            return Err(GraphError::config(format!(
                                "vapour fraction must lie in [0, 1], got {v}"
                            )));
                        }
                        self.prop_mut(key).fix(v)?;
                    }
                    Spec::Ref(r) => {
                        if !key.accepts_reference() {
                            return Err(GraphError::config(format!(
                                "'{key}' cannot be specified by a reference"
                            )));
                        }
                        self.references.insert(key, r);
                    }
                    Spec::Free => {
                        self.prop_mut(key).release();
                        self.references.remove(&key);
                    }
                }
            }
            ConnectionAttr::Start(key, v) => {
                if !key.is_primary() {
                    return Err(GraphError::config(format!(
                        "starting values exist for m, p and h only, not '{key}'"
                    )));
                }
                self.prop_mut(key).set_start(v)?;
            }
            ConnectionAttr::Unit(key, unit) => self.prop_mut(key).set_unit(unit)?,
            ConnectionAttr::Fluid(fractions) => {
                for (name, y) in fractions {
                    match y {
                        Some(y) => self.fluid.set(&name, y)?,
                        None => self.fluid.release(&name)?,
                    }
                }
                self.fluid.complete();
            }
            ConnectionAttr::FluidStart(fractions) => {
                for (name, y) in fractions {
                    self.fluid.set_start(&name, y)?;
                }
            }
            ConnectionAttr::FluidBalance(b) => self.fluid.balance = b,
            ConnectionAttr::Design(keys) => self.design = specifiable(keys)?,
            ConnectionAttr::Offdesign(keys) => self.offdesign = specifiable(keys)?,
            ConnectionAttr::State(state) => self.state = state,
            ConnectionAttr::Printout(b) => self.printout = b,
            ConnectionAttr::LocalDesign(b) => self.local_design = b,
            ConnectionAttr::LocalOffdesign(b) => self.local_offdesign = b,
            ConnectionAttr::MixingRule(rule) => self.mixing_rule = rule,
        }
        Ok(())
    }

    /// With a fully known composition, p, h and one more property fix the
    /// state; a fourth fixed property is rejected.
    pub fn check_overspecification(&self) -> GraphResult<()> {
        if !self.fluid.is_fully_set() {
            return Ok(());
        }
        let specs: Vec<&str> = PropKey::SPECIFIABLE
            .iter()
            .filter(|k| self.prop(**k).is_set)
            .map(|k| k.key())
            .collect();
        if specs.len() > 3 {
            return Err(GraphError::config(format!(
                "more than 3 properties specified for connection '{}' with a known \
                 fluid composition: {}; this over-determines the fluid state",
                self.label,
                specs.join(", ")
            )));
        }
        Ok(())
    }

    /// Substance handles with the current mass fractions.
    pub fn fluid_data(&self) -> FluidData {
        FluidData::new(
            self.wrappers
                .iter()
                .zip(self.fluid.entries())
                .map(|(w, e)| FluidEntry {
                    wrapper: Arc::clone(w),
                    mass_fraction: e.val,
                })
                .collect(),
            self.mixing_rule,
        )
    }

    pub fn reset_solved(&mut self) {
        for key in PropKey::ALL {
            self.prop_mut(key).solved = false;
        }
    }

    /// Compute enthalpy (and pressure) directly where p together with T,
    /// Td_bp or x, or T together with x, determine them, and take the
    /// affected properties out of the Newton system. Repeated calls on
    /// unchanged input give identical values.
    pub fn simplify_specifications(&mut self) -> GraphResult<()> {
        self.check_overspecification()?;
        if !self.fluid.is_fully_set() {
            return Ok(());
        }
        let data = self.fluid_data();

        if !self.h.is_set && self.p.is_set {
            let p = self.p.val_si;
            if self.t.is_set {
                self.h.val_si = mixture::h_mix_pt(p, self.t.val_si, &data)?;
                self.t.solved = true;
            } else if self.td_bp.is_set {
                let t_sat = mixture::t_sat_p(p, &data)?;
                self.h.val_si = mixture::h_mix_pt(p, t_sat + self.td_bp.val_si, &data)?;
                self.td_bp.solved = true;
            } else if self.x.is_set {
                self.h.val_si = mixture::h_mix_pq(p, self.x.val_si, &data)?;
                self.x.solved = true;
            } else {
                return Ok(());
            }
            self.h.solved = true;
            debug!(connection = %self.label, h = self.h.val_si, "enthalpy determined before solving");
        } else if !self.h.is_set && !self.p.is_set && self.t.is_set && self.x.is_set {
            self.p.val_si = mixture::p_sat_t(self.t.val_si, &data)?;
            self.h.val_si = mixture::h_mix_pq(self.p.val_si, self.x.val_si, &data)?;
            self.t.solved = true;
            self.x.solved = true;
            self.p.solved = true;
            self.h.solved = true;
            debug!(
                connection = %self.label,
                p = self.p.val_si,
                h = self.h.val_si,
                "saturation state determined before solving"
            );
        }
        Ok(())
    }

    /// Reserve one row per specified, not yet solved property, per reference
    /// and for the fluid balance. Returns the row count.
    pub fn preprocess(&mut self) -> usize {
        self.equations.clear();
        for (key, equation) in [
            (PropKey::T, ConnEquation::Temperature),
            (PropKey::V, ConnEquation::VolumetricFlow),
            (PropKey::X, ConnEquation::VapourFraction),
            (PropKey::TdBp, ConnEquation::BoilingPointDelta),
        ] {
            let c = self.prop(key);
            if c.is_set && !c.solved {
                self.equations.push(equation);
            }
        }
        self.equations
            .extend(self.references.keys().map(|k| ConnEquation::Reference(*k)));
        if self.fluid.balance {
            self.equations.push(ConnEquation::FluidBalance);
        }
        self.equations.len()
    }

    pub fn equations(&self) -> &[ConnEquation] {
        &self.equations
    }

    /// Remember the current SI values as design values.
    pub fn record_design(&mut self) {
        for key in PropKey::ALL {
            let c = self.prop_mut(key);
            c.design = c.val_si;
        }
    }

    /// Fix `key` at its design value.
    pub fn fix_at_design(&mut self, key: PropKey) -> GraphResult<()> {
        let label = self.label.clone();
        let c = self.prop_mut(key);
        if !c.design.is_finite() {
            return Err(GraphError::config(format!(
                "no design value for '{key}' at connection '{label}'"
            )));
        }
        let val = c.from_si(c.design);
        c.fix(val)
    }

    /// Temperature starting hint for mixture inversions.
    pub(crate) fn t_hint(&self) -> Option<f64> {
        self.t.val_si.is_finite().then_some(self.t.val_si)
    }

    pub fn calc_t(&self) -> GraphResult<f64> {
        Ok(mixture::t_mix_ph(
            self.p.val_si,
            self.h.val_si,
            &self.fluid_data(),
            self.t_hint(),
        )?)
    }

    /// Specific volume.
    pub fn calc_vol(&self) -> GraphResult<f64> {
        Ok(mixture::v_mix_ph(
            self.p.val_si,
            self.h.val_si,
            &self.fluid_data(),
            self.t_hint(),
        )?)
    }

    pub fn calc_s(&self) -> GraphResult<f64> {
        Ok(mixture::s_mix_ph(
            self.p.val_si,
            self.h.val_si,
            &self.fluid_data(),
            self.t_hint(),
        )?)
    }

    pub fn calc_x(&self) -> GraphResult<f64> {
        Ok(mixture::q_mix_ph(self.p.val_si, self.h.val_si, &self.fluid_data())?)
    }

    pub fn calc_td_bp(&self) -> GraphResult<f64> {
        let t_sat = mixture::t_sat_p(self.p.val_si, &self.fluid_data())?;
        Ok(self.calc_t()? - t_sat)
    }
}

fn specifiable(keys: Vec<PropKey>) -> GraphResult<Vec<PropKey>> {
    match keys.iter().find(|k| !k.is_specifiable()) {
        Some(k) => Err(GraphError::config(format!(
            "'{k}' cannot appear in a design or offdesign list"
        ))),
        None => Ok(keys),
    }
}
