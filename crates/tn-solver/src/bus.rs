//! Weighted aggregation of component energy flows.
//!
//! A bus is not part of the connection graph. It adds one equation to the
//! solve when its target total is fixed and is always available for
//! reporting afterwards.

use serde::{Deserialize, Serialize};
use tn_components::Component;
use tn_core::CompId;
use tn_graph::{ConnectionRegistry, EquationLedger, SolveContext};

use crate::error::{SolverError, SolverResult};

/// How the weight applies to a component's flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusBase {
    /// `contribution = weight * flow`, e.g. a generator fed by a turbine.
    #[default]
    #[serde(rename = "component")]
    Component,
    /// `contribution = flow / weight`, e.g. a motor driving a pump.
    #[serde(rename = "bus")]
    Bus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BusEntry {
    pub comp: CompId,
    pub weight: f64,
    pub base: BusBase,
    /// Contribution after the last solve, W.
    pub contribution: f64,
}

impl BusEntry {
    fn scale(&self) -> f64 {
        match self.base {
            BusBase::Component => self.weight,
            BusBase::Bus => 1.0 / self.weight,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bus {
    label: String,
    entries: Vec<BusEntry>,
    target: Option<f64>,
    value: f64,
    pub printout: bool,
}

impl Bus {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
            target: None,
            value: f64::NAN,
            printout: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Add a component with its weight. [`crate::Network::add_to_bus`] also
    /// checks that the component offers heat or power.
    pub fn add_component(&mut self, comp: CompId, weight: f64, base: BusBase) -> SolverResult<()> {
        if !weight.is_finite() || weight == 0.0 {
            return Err(SolverError::config(format!(
                "bus '{}' needs a finite, non-zero weight, got {weight}",
                self.label
            )));
        }
        if self.entries.iter().any(|e| e.comp == comp) {
            return Err(SolverError::config(format!(
                "component {comp} is already part of bus '{}'",
                self.label
            )));
        }
        self.entries.push(BusEntry {
            comp,
            weight,
            base,
            contribution: f64::NAN,
        });
        Ok(())
    }

    /// Fix the total (`Some`) so the bus adds an equation, or release it.
    pub fn set_target(&mut self, target: Option<f64>) -> SolverResult<()> {
        if let Some(t) = target {
            if !t.is_finite() {
                return Err(SolverError::config(format!(
                    "target of bus '{}' must be finite, got {t}",
                    self.label
                )));
            }
        }
        self.target = target;
        Ok(())
    }

    pub fn target(&self) -> Option<f64> {
        self.target
    }

    pub fn is_set(&self) -> bool {
        self.target.is_some()
    }

    pub fn entries(&self) -> &[BusEntry] {
        &self.entries
    }

    /// Total after the last solve, W.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn total(&self, comps: &[Component], conns: &ConnectionRegistry) -> SolverResult<f64> {
        let mut total = 0.0;
        for e in &self.entries {
            total += e.scale() * component(comps, e.comp)?.bus_flow(conns)?;
        }
        Ok(total)
    }

    /// `target - Σ contribution` and its derivatives into `row`.
    pub(crate) fn solve(
        &self,
        comps: &[Component],
        ctx: &SolveContext<'_>,
        row: usize,
        ledger: &mut EquationLedger,
    ) -> SolverResult<()> {
        let Some(target) = self.target else {
            return Ok(());
        };
        ledger.set_residual(row, target - self.total(comps, ctx.connections)?);
        for e in &self.entries {
            component(comps, e.comp)?.bus_flow_derivatives(row, -e.scale(), ctx, ledger)?;
        }
        Ok(())
    }

    /// Refresh the reported total and per-entry contributions.
    pub(crate) fn calc_results(
        &mut self,
        comps: &[Component],
        conns: &ConnectionRegistry,
    ) -> SolverResult<()> {
        for e in &mut self.entries {
            e.contribution = e.scale() * component(comps, e.comp)?.bus_flow(conns)?;
        }
        self.value = self.entries.iter().map(|e| e.contribution).sum();
        Ok(())
    }
}

fn component(comps: &[Component], id: CompId) -> SolverResult<&Component> {
    comps
        .get(id.slot())
        .ok_or_else(|| SolverError::config(format!("component {id} is not part of the network")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_validated() {
        let mut bus = Bus::new("power");
        let c = CompId::from_index(0);
        assert!(bus.add_component(c, 0.0, BusBase::Component).is_err());
        bus.add_component(c, 0.97, BusBase::Component).unwrap();
        assert!(bus.add_component(c, 1.0, BusBase::Bus).is_err());
        assert!(bus.set_target(Some(f64::NAN)).is_err());
        bus.set_target(Some(-1e6)).unwrap();
        assert!(bus.is_set());
    }

    #[test]
    fn base_selects_multiplication_or_division() {
        let mut e = BusEntry {
            comp: CompId::from_index(0),
            weight: 0.5,
            base: BusBase::Component,
            contribution: f64::NAN,
        };
        assert_eq!(e.scale(), 0.5);
        e.base = BusBase::Bus;
        assert_eq!(e.scale(), 2.0);
    }
}
