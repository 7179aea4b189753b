//! Serializable snapshot of a connection.
//!
//! NaN has no JSON representation, so missing and NaN values are stored as
//! `null` and read back as NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tn_core::{ConnId, Unit};
use tn_fluids::MixingRule;

use crate::attrs::{PhaseState, PropKey};
use crate::connection::Connection;
use crate::error::{GraphError, GraphResult};
use crate::reference::Reference;
use crate::registry::ConnectionRegistry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    pub val: Option<f64>,
    #[serde(rename = "val_SI")]
    pub val_si: Option<f64>,
    pub val0: Option<f64>,
    pub is_set: bool,
    pub unit: Unit,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidState {
    pub val: BTreeMap<String, f64>,
    /// Only substances with a starting value.
    #[serde(default)]
    pub val0: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_set: Vec<String>,
    #[serde(default)]
    pub balance: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceState {
    /// Label of the referenced connection.
    pub target: String,
    pub factor: f64,
    pub delta: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub label: String,
    /// Component labels at both ends.
    pub source: String,
    pub source_id: String,
    pub target: String,
    pub target_id: String,
    pub properties: BTreeMap<PropKey, PropertyState>,
    pub fluid: FluidState,
    #[serde(default)]
    pub references: BTreeMap<PropKey, ReferenceState>,
    #[serde(default)]
    pub design: Vec<PropKey>,
    #[serde(default)]
    pub offdesign: Vec<PropKey>,
    #[serde(default)]
    pub local_design: bool,
    #[serde(default)]
    pub local_offdesign: bool,
    #[serde(default = "default_printout")]
    pub printout: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "default_mixing_rule")]
    pub mixing_rule: String,
}

fn default_printout() -> bool {
    true
}

fn default_mixing_rule() -> String {
    MixingRule::default().key().to_string()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

impl Connection {
    /// Snapshot of this connection; `source` and `target` are the labels of
    /// the components at its ends.
    pub fn to_state(
        &self,
        source: &str,
        target: &str,
        registry: &ConnectionRegistry,
    ) -> GraphResult<ConnectionState> {
        let properties = PropKey::ALL
            .iter()
            .map(|&key| {
                let c = self.prop(key);
                let state = PropertyState {
                    val: finite(c.val),
                    val_si: finite(c.val_si),
                    val0: finite(c.val0),
                    is_set: c.is_set,
                    unit: c.unit,
                };
                (key, state)
            })
            .collect();

        let references = self
            .references()
            .map(|(key, r)| {
                Ok((
                    key,
                    ReferenceState {
                        target: registry.get(r.target())?.label().to_string(),
                        factor: r.factor(),
                        delta: r.delta(),
                    },
                ))
            })
            .collect::<GraphResult<_>>()?;

        let entries = self.fluid().entries();
        let fluid = FluidState {
            val: entries.iter().map(|e| (e.name.clone(), e.val)).collect(),
            val0: entries
                .iter()
                .filter_map(|e| finite(e.val0).map(|v| (e.name.clone(), v)))
                .collect(),
            is_set: entries
                .iter()
                .filter(|e| e.is_set)
                .map(|e| e.name.clone())
                .collect(),
            balance: self.fluid().balance,
        };

        Ok(ConnectionState {
            label: self.label().to_string(),
            source: source.to_string(),
            source_id: self.source().id.clone(),
            target: target.to_string(),
            target_id: self.target().id.clone(),
            properties,
            fluid,
            references,
            design: self.design_keys().to_vec(),
            offdesign: self.offdesign_keys().to_vec(),
            local_design: self.local_design(),
            local_offdesign: self.local_offdesign(),
            printout: self.printout(),
            state: self.state().map(|s| s.key().to_string()),
            mixing_rule: self.mixing_rule().key().to_string(),
        })
    }

    /// Restore a snapshot with resolved references. On error the connection
    /// is unchanged.
    pub fn apply_state(
        &mut self,
        state: &ConnectionState,
        references: BTreeMap<PropKey, Reference>,
    ) -> GraphResult<()> {
        let mut next = self.clone();
        for (&key, ps) in &state.properties {
            let c = next.prop_mut(key);
            c.set_unit(ps.unit)?;
            if ps.is_set && ps.val.is_none() {
                return Err(GraphError::config(format!(
                    "'{key}' is marked as set but has no value"
                )));
            }
            c.val = ps.val.unwrap_or(f64::NAN);
            c.val_si = ps
                .val_si
                .or(ps.val.map(|v| c.to_si(v)))
                .unwrap_or(f64::NAN);
            c.val0 = ps.val0.unwrap_or(f64::NAN);
            c.is_set = ps.is_set;
            if c.is_system_variable() {
                c.is_var = !ps.is_set;
            }
        }

        for (name, &y) in &state.fluid.val {
            let index = next.fluid.index_of(name).ok_or_else(|| {
                GraphError::config(format!("fluid '{name}' is not part of the network"))
            })?;
            let val0 = state.fluid.val0.get(name).copied().unwrap_or(f64::NAN);
            let is_set = state.fluid.is_set.iter().any(|n| n == name);
            next.fluid.restore(index, y, val0, is_set);
        }
        next.fluid.balance = state.fluid.balance;

        next.references = references;
        next.design = state.design.clone();
        next.offdesign = state.offdesign.clone();
        next.local_design = state.local_design;
        next.local_offdesign = state.local_offdesign;
        next.printout = state.printout;
        next.state = state
            .state
            .as_deref()
            .map(str::parse::<PhaseState>)
            .transpose()?;
        next.mixing_rule = state
            .mixing_rule
            .parse()
            .map_err(|e: tn_fluids::FluidError| GraphError::config(e.to_string()))?;

        next.check_overspecification()?;
        *self = next;
        Ok(())
    }
}

impl ConnectionRegistry {
    /// Resolve the reference labels of `state` and restore connection `id`.
    pub fn apply_state(&mut self, id: ConnId, state: &ConnectionState) -> GraphResult<()> {
        let mut references = BTreeMap::new();
        for (&key, rs) in &state.references {
            let reference = Reference::new(self.id_of(&rs.target)?, rs.factor, rs.delta)?;
            self.validate_reference(id, &reference)?;
            references.insert(key, reference);
        }
        self.get_mut(id)?.apply_state(state, references)
    }

    /// Snapshot of connection `id` with component labels at its ends.
    pub fn state_of(&self, id: ConnId, source: &str, target: &str) -> GraphResult<ConnectionState> {
        self.get(id)?.to_state(source, target, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ConnectionAttr;
    use crate::connection::tests::{connection, water};
    use proptest::prelude::*;

    fn pair() -> (ConnectionRegistry, ConnId, ConnId) {
        let mut reg = ConnectionRegistry::new();
        let a = reg.insert(water("a")).unwrap();
        let b = reg.insert(water("b")).unwrap();
        (reg, a, b)
    }

    #[test]
    fn snapshot_names_reference_targets_by_label() {
        let (mut reg, a, b) = pair();
        let r = Reference::new(a, 10.0, 5.0).unwrap();
        reg.set_attr(
            b,
            [
                ConnectionAttr::property(PropKey::M, r),
                ConnectionAttr::property(PropKey::P, 2.0),
            ],
        )
        .unwrap();
        let state = reg.state_of(b, "valve", "sink").unwrap();
        assert_eq!(state.references[&PropKey::M].target, "a");
        assert_eq!(state.references[&PropKey::M].factor, 10.0);
        assert_eq!(state.properties[&PropKey::P].val, Some(2.0));
        assert_eq!(state.properties[&PropKey::T].val, None);
        assert_eq!(state.fluid.is_set, vec!["water".to_string()]);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"val_SI\""));
        assert!(json.contains("\"Td_bp\""));
    }

    #[test]
    fn restore_reproduces_snapshot() {
        let (mut reg, a, b) = pair();
        reg.set_attr(
            a,
            [
                ConnectionAttr::property(PropKey::T, 350.0),
                ConnectionAttr::Start(PropKey::P, 3e5),
                ConnectionAttr::Design(vec![PropKey::T]),
                ConnectionAttr::State(Some(PhaseState::Liquid)),
            ],
        )
        .unwrap();
        reg.set_attr(
            b,
            [ConnectionAttr::property(
                PropKey::T,
                Reference::new(a, 1.0, -10.0).unwrap(),
            )],
        )
        .unwrap();
        let sa = reg.state_of(a, "src", "v").unwrap();
        let sb = reg.state_of(b, "v", "snk").unwrap();

        let mut fresh = ConnectionRegistry::new();
        let fa = fresh.insert(water("a")).unwrap();
        let fb = fresh.insert(water("b")).unwrap();
        fresh.apply_state(fa, &sa).unwrap();
        fresh.apply_state(fb, &sb).unwrap();
        assert_eq!(fresh.state_of(fa, "src", "v").unwrap(), sa);
        assert_eq!(fresh.state_of(fb, "v", "snk").unwrap(), sb);
        assert!(!fresh.get(fa).unwrap().p.is_set);
        assert!(fresh.get(fa).unwrap().p.is_var);
        assert_eq!(fresh.get(fa).unwrap().p.start_si(), Some(3e5));
    }

    #[test]
    fn bad_snapshot_leaves_connection_untouched() {
        let (mut reg, a, _) = pair();
        let mut state = reg.state_of(a, "s", "t").unwrap();
        state.references.insert(
            PropKey::H,
            ReferenceState {
                target: "missing".to_string(),
                factor: 1.0,
                delta: 0.0,
            },
        );
        assert!(matches!(
            reg.apply_state(a, &state),
            Err(GraphError::UnknownLabel { .. })
        ));

        let mut state = reg.state_of(a, "s", "t").unwrap();
        for key in [PropKey::M, PropKey::P, PropKey::H, PropKey::T] {
            let p = state.properties.get_mut(&key).unwrap();
            p.val = Some(1.0);
            p.val_si = Some(1.0);
            p.is_set = true;
        }
        assert!(reg.apply_state(a, &state).is_err());
        assert!(!reg.get(a).unwrap().m.is_set);
    }

    proptest! {
        #[test]
        fn json_round_trip_preserves_mixture_snapshot(
            m in -10.0f64..10.0,
            p in 1e3f64..1e7,
            h in -1e5f64..1e6,
            y in 0.0f64..1.0,
            fix_p in any::<bool>(),
        ) {
            let mut c = connection("c", &["N2", "O2"]);
            let mut attrs = vec![ConnectionAttr::fluid([("N2", y)])];
            if fix_p {
                attrs.push(ConnectionAttr::property(PropKey::P, p));
            }
            c.set_attr(attrs).unwrap();
            c.m.val_si = m;
            c.h.val_si = h;
            let mut reg = ConnectionRegistry::new();
            let id = reg.insert(c.clone()).unwrap();
            let state = reg.state_of(id, "a", "b").unwrap();
            let json = serde_json::to_string(&state).unwrap();
            let back: ConnectionState = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(&back, &state);

            let mut fresh = ConnectionRegistry::new();
            let fid = fresh.insert(connection("c", &["N2", "O2"])).unwrap();
            fresh.apply_state(fid, &back).unwrap();
            prop_assert_eq!(fresh.state_of(fid, "a", "b").unwrap(), state);
        }
    }
}
