//! Typed connection attributes and the string-keyed entry point.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tn_core::{PropertyKind, Unit};
use tn_fluids::MixingRule;

use crate::error::{GraphError, GraphResult};
use crate::reference::Reference;

/// Property containers of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropKey {
    #[serde(rename = "m")]
    M,
    #[serde(rename = "p")]
    P,
    #[serde(rename = "h")]
    H,
    #[serde(rename = "T")]
    T,
    #[serde(rename = "v")]
    V,
    #[serde(rename = "x")]
    X,
    #[serde(rename = "Td_bp")]
    TdBp,
    #[serde(rename = "vol")]
    Vol,
    #[serde(rename = "s")]
    S,
}

impl PropKey {
    pub const ALL: [PropKey; 9] = [
        PropKey::M,
        PropKey::P,
        PropKey::H,
        PropKey::T,
        PropKey::V,
        PropKey::X,
        PropKey::TdBp,
        PropKey::Vol,
        PropKey::S,
    ];

    /// Properties a user may fix; at most three of them at once.
    pub const SPECIFIABLE: [PropKey; 7] = [
        PropKey::M,
        PropKey::P,
        PropKey::H,
        PropKey::T,
        PropKey::V,
        PropKey::X,
        PropKey::TdBp,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PropKey::M => "m",
            PropKey::P => "p",
            PropKey::H => "h",
            PropKey::T => "T",
            PropKey::V => "v",
            PropKey::X => "x",
            PropKey::TdBp => "Td_bp",
            PropKey::Vol => "vol",
            PropKey::S => "s",
        }
    }

    pub fn kind(self) -> PropertyKind {
        match self {
            PropKey::M => PropertyKind::MassFlow,
            PropKey::P => PropertyKind::Pressure,
            PropKey::H => PropertyKind::Enthalpy,
            PropKey::T | PropKey::TdBp => PropertyKind::Temperature,
            PropKey::V => PropertyKind::VolumetricFlow,
            PropKey::X => PropertyKind::Fraction,
            PropKey::Vol => PropertyKind::SpecificVolume,
            PropKey::S => PropertyKind::Entropy,
        }
    }

    /// Mass flow, pressure and enthalpy.
    pub fn is_primary(self) -> bool {
        matches!(self, PropKey::M | PropKey::P | PropKey::H)
    }

    pub fn is_specifiable(self) -> bool {
        !matches!(self, PropKey::Vol | PropKey::S)
    }

    pub fn accepts_reference(self) -> bool {
        matches!(
            self,
            PropKey::M | PropKey::P | PropKey::H | PropKey::T | PropKey::V
        )
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PropKey {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropKey::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| GraphError::config(format!("unknown connection property '{s}'")))
    }
}

/// Phase forced on a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseState {
    Liquid,
    Gas,
}

impl PhaseState {
    pub fn key(self) -> &'static str {
        match self {
            PhaseState::Liquid => "l",
            PhaseState::Gas => "g",
        }
    }
}

impl FromStr for PhaseState {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l" => Ok(PhaseState::Liquid),
            "g" => Ok(PhaseState::Gas),
            _ => Err(GraphError::config(format!(
                "state must be 'l' or 'g', got '{s}'"
            ))),
        }
    }
}

/// Specification of one property.
#[derive(Clone, Debug, PartialEq)]
pub enum Spec {
    /// Fixed value in the property's unit.
    Value(f64),
    /// Coupled to another connection.
    Ref(Reference),
    /// Unset; primary properties become free unknowns.
    Free,
}

impl From<f64> for Spec {
    fn from(v: f64) -> Self {
        Spec::Value(v)
    }
}

impl From<Option<f64>> for Spec {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Spec::Free, Spec::Value)
    }
}

impl From<Reference> for Spec {
    fn from(r: Reference) -> Self {
        Spec::Ref(r)
    }
}

/// One typed attribute assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionAttr {
    Property(PropKey, Spec),
    /// Starting value of m, p or h.
    Start(PropKey, f64),
    Unit(PropKey, Unit),
    /// Fractions to fix (`Some`) or free (`None`).
    Fluid(Vec<(String, Option<f64>)>),
    FluidStart(Vec<(String, f64)>),
    FluidBalance(bool),
    Design(Vec<PropKey>),
    Offdesign(Vec<PropKey>),
    State(Option<PhaseState>),
    Printout(bool),
    LocalDesign(bool),
    LocalOffdesign(bool),
    MixingRule(MixingRule),
}

impl ConnectionAttr {
    pub fn property(key: PropKey, spec: impl Into<Spec>) -> Self {
        ConnectionAttr::Property(key, spec.into())
    }

    pub fn fluid<S: Into<String>>(fractions: impl IntoIterator<Item = (S, f64)>) -> Self {
        ConnectionAttr::Fluid(
            fractions
                .into_iter()
                .map(|(name, y)| (name.into(), Some(y)))
                .collect(),
        )
    }

    /// Parse a string-keyed assignment.
    pub fn from_key_value(key: &str, value: AttrValue) -> GraphResult<Self> {
        let found = value.type_name();
        let wrong_type = |expected: &str| {
            GraphError::config(format!(
                "wrong value type for '{key}': expected {expected}, got {found}"
            ))
        };
        match key {
            "label" => Err(GraphError::config("the label of a connection cannot be changed")),
            "m" | "p" | "h" | "T" | "v" | "x" | "Td_bp" => {
                let prop: PropKey = key.parse()?;
                match value {
                    AttrValue::None => Ok(ConnectionAttr::Property(prop, Spec::Free)),
                    AttrValue::Number(v) => Ok(ConnectionAttr::Property(prop, Spec::Value(v))),
                    AttrValue::Ref(r) => Ok(ConnectionAttr::Property(prop, Spec::Ref(r))),
                    _ => Err(wrong_type("number, none or reference")),
                }
            }
            "m0" | "p0" | "h0" => {
                let prop: PropKey = key[..1].parse()?;
                match value {
                    AttrValue::Number(v) => Ok(ConnectionAttr::Start(prop, v)),
                    _ => Err(wrong_type("number")),
                }
            }
            "fluid" => match value {
                AttrValue::Fractions(f) => Ok(ConnectionAttr::Fluid(f)),
                _ => Err(wrong_type("fractions")),
            },
            "fluid0" => match value {
                AttrValue::Fractions(f) => f
                    .into_iter()
                    .map(|(name, y)| {
                        y.map(|y| (name.clone(), y)).ok_or_else(|| {
                            GraphError::config(format!("starting fraction of '{name}' missing"))
                        })
                    })
                    .collect::<GraphResult<Vec<_>>>()
                    .map(ConnectionAttr::FluidStart),
                _ => Err(wrong_type("fractions")),
            },
            "fluid_balance" | "printout" | "local_design" | "local_offdesign" => {
                let AttrValue::Bool(b) = value else {
                    return Err(wrong_type("bool"));
                };
                Ok(match key {
                    "fluid_balance" => ConnectionAttr::FluidBalance(b),
                    "printout" => ConnectionAttr::Printout(b),
                    "local_design" => ConnectionAttr::LocalDesign(b),
                    _ => ConnectionAttr::LocalOffdesign(b),
                })
            }
            "design" | "offdesign" => {
                let AttrValue::Keys(keys) = value else {
                    return Err(wrong_type("list of property keys"));
                };
                let keys = keys
                    .iter()
                    .map(|k| k.parse::<PropKey>())
                    .collect::<GraphResult<Vec<_>>>()?;
                Ok(if key == "design" {
                    ConnectionAttr::Design(keys)
                } else {
                    ConnectionAttr::Offdesign(keys)
                })
            }
            "state" => match value {
                AttrValue::None => Ok(ConnectionAttr::State(None)),
                AttrValue::Text(s) => Ok(ConnectionAttr::State(Some(s.parse()?))),
                _ => Err(wrong_type("'l', 'g' or none")),
            },
            "mixing_rule" => match value {
                AttrValue::Text(s) => s
                    .parse()
                    .map(ConnectionAttr::MixingRule)
                    .map_err(|e: tn_fluids::FluidError| GraphError::config(e.to_string())),
                _ => Err(wrong_type("text")),
            },
            _ => {
                if let Some(prop) = key.strip_suffix("_unit") {
                    let prop: PropKey = prop.parse()?;
                    return match value {
                        AttrValue::Text(s) => s
                            .parse()
                            .map(|unit| ConnectionAttr::Unit(prop, unit))
                            .map_err(|e: tn_core::TnError| GraphError::config(e.to_string())),
                        _ => Err(wrong_type("unit symbol")),
                    };
                }
                Err(GraphError::config(format!(
                    "connection has no attribute '{key}'"
                )))
            }
        }
    }
}

/// Loosely typed value for [`ConnectionAttr::from_key_value`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    None,
    Number(f64),
    Bool(bool),
    Text(String),
    Ref(Reference),
    Fractions(Vec<(String, Option<f64>)>),
    Keys(Vec<String>),
}

impl AttrValue {
    fn type_name(&self) -> &'static str {
        match self {
            AttrValue::None => "none",
            AttrValue::Number(_) => "number",
            AttrValue::Bool(_) => "bool",
            AttrValue::Text(_) => "text",
            AttrValue::Ref(_) => "reference",
            AttrValue::Fractions(_) => "fractions",
            AttrValue::Keys(_) => "list",
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<Reference> for AttrValue {
    fn from(r: Reference) -> Self {
        AttrValue::Ref(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tn_core::ConnId;

    #[test]
    fn keys_parse_to_typed_attributes() {
        assert_eq!(
            ConnectionAttr::from_key_value("p", 2.0.into()).unwrap(),
            ConnectionAttr::Property(PropKey::P, Spec::Value(2.0))
        );
        assert_eq!(
            ConnectionAttr::from_key_value("Td_bp", AttrValue::None).unwrap(),
            ConnectionAttr::Property(PropKey::TdBp, Spec::Free)
        );
        assert_eq!(
            ConnectionAttr::from_key_value("h0", 4e5.into()).unwrap(),
            ConnectionAttr::Start(PropKey::H, 4e5)
        );
        assert_eq!(
            ConnectionAttr::from_key_value("T_unit", "C".into()).unwrap(),
            ConnectionAttr::Unit(PropKey::T, Unit::Celsius)
        );
        assert_eq!(
            ConnectionAttr::from_key_value("state", "l".into()).unwrap(),
            ConnectionAttr::State(Some(PhaseState::Liquid))
        );
        assert_eq!(
            ConnectionAttr::from_key_value(
                "design",
                AttrValue::Keys(vec!["p".into(), "T".into()])
            )
            .unwrap(),
            ConnectionAttr::Design(vec![PropKey::P, PropKey::T])
        );
    }

    #[test]
    fn unknown_keys_and_wrong_types_are_configuration_errors() {
        for (key, value) in [
            ("pressure", AttrValue::Number(1.0)),
            ("p", AttrValue::Bool(true)),
            ("fluid_balance", AttrValue::Number(1.0)),
            ("label", AttrValue::Text("c2".into())),
            ("state", AttrValue::Text("s".into())),
            ("design", AttrValue::Keys(vec!["zeta".into()])),
            ("m0", AttrValue::None),
        ] {
            let err = ConnectionAttr::from_key_value(key, value).unwrap_err();
            assert!(matches!(err, GraphError::Configuration { .. }), "{key}: {err}");
        }
    }

    #[test]
    fn reference_value_is_accepted_for_properties() {
        let r = Reference::new(ConnId::from_index(3), 1.0, 0.0).unwrap();
        assert_eq!(
            ConnectionAttr::from_key_value("m", r.into()).unwrap(),
            ConnectionAttr::Property(PropKey::M, Spec::Ref(r))
        );
    }

    #[test]
    fn prop_keys_round_trip() {
        for key in PropKey::ALL {
            assert_eq!(key.key().parse::<PropKey>().unwrap(), key);
        }
    }
}
