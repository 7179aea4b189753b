//! Tri-state holder for one scalar physical quantity.

use tn_core::{PropertyKind, Unit};

use crate::error::{GraphError, GraphResult};

/// One scalar quantity of a connection.
///
/// A container is either fixed (`is_set`), a free unknown of the Newton
/// system (`is_var && !solved`), or unspecified. System variables (m, p, h)
/// keep `is_var == !is_set`; derived quantities are never variables.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyContainer {
    /// Value in `unit`.
    pub val: f64,
    pub val_si: f64,
    /// Starting value in `unit`, NaN if none was given.
    pub val0: f64,
    pub is_set: bool,
    pub is_var: bool,
    /// Value was determined before the solve and is excluded from it.
    pub solved: bool,
    /// Admissible range of the SI value.
    pub min: f64,
    pub max: f64,
    pub unit: Unit,
    /// SI value recorded by the last design run, NaN if none.
    pub design: f64,
    system: bool,
    difference: bool,
}

impl PropertyContainer {
    /// Derived or output quantity.
    pub fn new(unit: Unit) -> Self {
        Self {
            val: f64::NAN,
            val_si: f64::NAN,
            val0: f64::NAN,
            is_set: false,
            is_var: false,
            solved: false,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            unit,
            design: f64::NAN,
            system: false,
            difference: false,
        }
    }

    /// System variable: free until fixed.
    pub fn system(unit: Unit) -> Self {
        Self {
            is_var: true,
            system: true,
            ..Self::new(unit)
        }
    }

    /// Quantity stored as a difference, converted without unit offset.
    pub fn difference(unit: Unit) -> Self {
        Self {
            difference: true,
            ..Self::new(unit)
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn kind(&self) -> PropertyKind {
        self.unit.kind()
    }

    pub fn is_system_variable(&self) -> bool {
        self.system
    }

    /// Free unknown of the current solve.
    pub fn is_unknown(&self) -> bool {
        self.is_var && !self.solved
    }

    pub fn to_si(&self, v: f64) -> f64 {
        if self.difference {
            self.unit.delta_to_si(v)
        } else {
            self.unit.to_si(v)
        }
    }

    pub fn from_si(&self, v: f64) -> f64 {
        if self.difference {
            self.unit.delta_from_si(v)
        } else {
            self.unit.from_si(v)
        }
    }

    /// Fix the quantity to `val` given in the container unit.
    pub fn fix(&mut self, val: f64) -> GraphResult<()> {
        if !val.is_finite() {
            return Err(GraphError::config(format!(
                "value for {} must be finite, got {val}",
                self.kind().name()
            )));
        }
        self.val = val;
        self.val_si = self.to_si(val);
        self.is_set = true;
        if self.system {
            self.is_var = false;
        }
        Ok(())
    }

    pub fn release(&mut self) {
        self.is_set = false;
        if self.system {
            self.is_var = true;
        }
    }

    /// Starting value in the container unit.
    pub fn set_start(&mut self, val0: f64) -> GraphResult<()> {
        if !val0.is_finite() {
            return Err(GraphError::config(format!(
                "starting value for {} must be finite, got {val0}",
                self.kind().name()
            )));
        }
        self.val0 = val0;
        Ok(())
    }

    /// SI starting value, if one was given.
    pub fn start_si(&self) -> Option<f64> {
        self.val0.is_finite().then(|| self.to_si(self.val0))
    }

    /// Change the unit; a fixed value keeps its number and is reconverted.
    pub fn set_unit(&mut self, unit: Unit) -> GraphResult<()> {
        self.unit = unit.ensure_kind(self.kind())?;
        if self.is_set {
            self.val_si = self.to_si(self.val);
        }
        Ok(())
    }

    /// Refresh `val` from `val_si`.
    pub fn sync_val(&mut self) {
        self.val = self.from_si(self.val_si);
    }

    pub fn clamp_to_range(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}
