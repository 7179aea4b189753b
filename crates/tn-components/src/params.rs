//! Component parameters and their containers.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ComponentError, ComponentResult};

/// Parameters a component may offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamKey {
    /// Outlet to inlet pressure ratio.
    #[serde(rename = "pr")]
    Pr,
    /// Geometry independent friction coefficient.
    #[serde(rename = "zeta")]
    Zeta,
    /// Heat flow into the fluid, W.
    #[serde(rename = "Q")]
    Q,
    /// Power transferred to the fluid, W.
    #[serde(rename = "P")]
    P,
    #[serde(rename = "eta_s")]
    EtaS,
    /// Heat transfer coefficient times area, W/K.
    #[serde(rename = "kA")]
    KA,
    /// Ambient temperature, K.
    #[serde(rename = "Tamb")]
    Tamb,
}

impl ParamKey {
    pub fn key(self) -> &'static str {
        match self {
            ParamKey::Pr => "pr",
            ParamKey::Zeta => "zeta",
            ParamKey::Q => "Q",
            ParamKey::P => "P",
            ParamKey::EtaS => "eta_s",
            ParamKey::KA => "kA",
            ParamKey::Tamb => "Tamb",
        }
    }

    /// Starting value when the parameter becomes a free unknown without a
    /// value of its own.
    pub(crate) fn default_start(self) -> f64 {
        match self {
            ParamKey::Pr => 0.9,
            ParamKey::Zeta => 1e5,
            ParamKey::Q => -1e3,
            ParamKey::P => 1e3,
            ParamKey::EtaS => 0.8,
            ParamKey::KA => 1e2,
            ParamKey::Tamb => 293.15,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ParamKey {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pr" => ParamKey::Pr,
            "zeta" => ParamKey::Zeta,
            "Q" => ParamKey::Q,
            "P" => ParamKey::P,
            "eta_s" => ParamKey::EtaS,
            "kA" => ParamKey::KA,
            "Tamb" => ParamKey::Tamb,
            _ => return Err(ComponentError::config(format!("unknown parameter '{s}'"))),
        })
    }
}

/// Specification of a parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamSpec {
    /// Fixed value, SI.
    Value(f64),
    /// Active equation with the parameter as an extra unknown.
    Var,
    /// Unset; the parameter is only reported after solving.
    Free,
}

impl From<f64> for ParamSpec {
    fn from(v: f64) -> Self {
        ParamSpec::Value(v)
    }
}

impl From<Option<f64>> for ParamSpec {
    fn from(v: Option<f64>) -> Self {
        v.map_or(ParamSpec::Free, ParamSpec::Value)
    }
}

/// One scalar component parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamContainer {
    /// SI value, NaN until set or calculated.
    pub val: f64,
    pub is_set: bool,
    pub is_var: bool,
    pub min: f64,
    pub max: f64,
    /// Value recorded by the last design run, NaN if none.
    pub design: f64,
    col: Option<usize>,
}

impl ParamContainer {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            val: f64::NAN,
            is_set: false,
            is_var: false,
            min,
            max,
            design: f64::NAN,
            col: None,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub(crate) fn apply(&mut self, key: ParamKey, spec: ParamSpec) -> ComponentResult<()> {
        match spec {
            ParamSpec::Value(v) => {
                if !v.is_finite() {
                    return Err(ComponentError::config(format!(
                        "value for '{key}' must be finite, got {v}"
                    )));
                }
                self.val = v;
                self.is_set = true;
                self.is_var = false;
            }
            ParamSpec::Var => {
                if !self.val.is_finite() {
                    self.val = key.default_start();
                }
                self.val = self.clamp(self.val);
                self.is_set = true;
                self.is_var = true;
            }
            ParamSpec::Free => {
                self.is_set = false;
                self.is_var = false;
            }
        }
        Ok(())
    }

    /// Column of a free parameter in the current solve.
    pub fn column(&self) -> Option<usize> {
        self.col
    }

    pub fn set_column(&mut self, col: Option<usize>) {
        self.col = col;
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    /// Full width of the admissible range, infinite when unbounded.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_starts_from_default_inside_range() {
        let mut pr = ParamContainer::new(1e-4, 1.0);
        pr.apply(ParamKey::Pr, ParamSpec::Var).unwrap();
        assert!(pr.is_set && pr.is_var);
        assert_eq!(pr.val, 0.9);

        let mut zeta = ParamContainer::new(0.0, 1e15);
        zeta.val = 42.0;
        zeta.apply(ParamKey::Zeta, ParamSpec::Var).unwrap();
        assert_eq!(zeta.val, 42.0);
    }

    #[test]
    fn free_keeps_last_value_for_reporting() {
        let mut q = ParamContainer::unbounded();
        q.apply(ParamKey::Q, 5.0.into()).unwrap();
        q.apply(ParamKey::Q, None.into()).unwrap();
        assert!(!q.is_set);
        assert_eq!(q.val, 5.0);
        assert!(q.apply(ParamKey::Q, f64::NAN.into()).is_err());
    }

    #[test]
    fn keys_parse_back() {
        for key in [
            ParamKey::Pr,
            ParamKey::Zeta,
            ParamKey::Q,
            ParamKey::P,
            ParamKey::EtaS,
            ParamKey::KA,
            ParamKey::Tamb,
        ] {
            assert_eq!(key.key().parse::<ParamKey>().unwrap(), key);
        }
        assert!("dp".parse::<ParamKey>().is_err());
    }
}
