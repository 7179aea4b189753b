//! Per-substance mass fraction state of a connection.

use tn_core::ERR;

use crate::error::{GraphError, GraphResult};

#[derive(Clone, Debug, PartialEq)]
pub struct FluidFraction {
    pub name: String,
    pub val: f64,
    /// Starting value, NaN if none was given.
    pub val0: f64,
    pub is_set: bool,
}

/// Mass fractions over the declared substance set, in declaration order.
///
/// Every substance is either fixed or free, so the set and variable
/// partitions always cover the declared set.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidComposition {
    entries: Vec<FluidFraction>,
    /// Activates `1 - Σ y_i = 0` for this connection.
    pub balance: bool,
}

impl FluidComposition {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            entries: names
                .iter()
                .map(|n| FluidFraction {
                    name: n.as_ref().to_string(),
                    val: 0.0,
                    val0: f64::NAN,
                    is_set: false,
                })
                .collect(),
            balance: false,
        }
    }

    pub fn entries(&self) -> &[FluidFraction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&FluidFraction> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> GraphResult<&mut FluidFraction> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| GraphError::config(format!("fluid '{name}' is not part of the network")))
    }

    /// Fix the fraction of `name`.
    pub fn set(&mut self, name: &str, val: f64) -> GraphResult<()> {
        check_fraction(name, val)?;
        let entry = self.entry_mut(name)?;
        entry.val = val;
        entry.is_set = true;
        Ok(())
    }

    /// Make the fraction of `name` a free unknown.
    pub fn release(&mut self, name: &str) -> GraphResult<()> {
        self.entry_mut(name)?.is_set = false;
        Ok(())
    }

    pub fn set_start(&mut self, name: &str, val0: f64) -> GraphResult<()> {
        check_fraction(name, val0)?;
        self.entry_mut(name)?.val0 = val0;
        Ok(())
    }

    /// Overwrite an entry from a snapshot.
    pub(crate) fn restore(&mut self, index: usize, val: f64, val0: f64, is_set: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.val = val;
            entry.val0 = val0;
            entry.is_set = is_set;
        }
    }

    pub(crate) fn set_start_at(&mut self, index: usize, val0: f64) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.val0 = val0;
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.val).collect()
    }

    /// Overwrite the fraction at `index`, clipped to [0, 1].
    pub fn set_value(&mut self, index: usize, val: f64) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.val = val.clamp(0.0, 1.0);
        }
    }

    pub fn is_fully_set(&self) -> bool {
        self.entries.iter().all(|e| e.is_set)
    }

    pub fn any_set(&self) -> bool {
        self.entries.iter().any(|e| e.is_set)
    }

    /// Indices of free fractions.
    pub fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_set)
            .map(|(i, _)| i)
    }

    pub fn set_sum(&self) -> f64 {
        self.entries.iter().filter(|e| e.is_set).map(|e| e.val).sum()
    }

    /// Once the fixed fractions add up to one, the remaining substances are
    /// fixed at zero.
    pub fn complete(&mut self) {
        if self.any_set() && (self.set_sum() - 1.0).abs() <= ERR {
            for entry in self.entries.iter_mut().filter(|e| !e.is_set) {
                entry.val = 0.0;
                entry.is_set = true;
            }
        }
    }

    /// Scale the free fractions so the composition adds up to one.
    pub fn normalize(&mut self) {
        let remainder = (1.0 - self.set_sum()).max(0.0);
        let free: Vec<usize> = self.free_indices().collect();
        if free.is_empty() {
            return;
        }
        let free_sum: f64 = free.iter().map(|&i| self.entries[i].val.max(0.0)).sum();
        for &i in &free {
            let entry = &mut self.entries[i];
            entry.val = if free_sum > 0.0 {
                entry.val.max(0.0) * remainder / free_sum
            } else {
                remainder / free.len() as f64
            };
            entry.val = entry.val.clamp(0.0, 1.0);
        }
    }
}

fn check_fraction(name: &str, val: f64) -> GraphResult<()> {
    if val.is_finite() && (0.0..=1.0).contains(&val) {
        Ok(())
    } else {
        Err(GraphError::config(format!(
            "mass fraction of '{name}' must lie in [0, 1], got {val}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_fractions_summing_to_one_complete_the_set() {
        let mut fluid = FluidComposition::new(&["water", "N2", "O2"]);
        fluid.set("water", 1.0).unwrap();
        assert!(!fluid.is_fully_set());
        fluid.complete();
        assert!(fluid.is_fully_set());
        assert_eq!(fluid.values(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn partial_specification_stays_partial() {
        let mut fluid = FluidComposition::new(&["N2", "O2"]);
        fluid.set("N2", 0.7).unwrap();
        fluid.complete();
        assert!(!fluid.is_fully_set());
        assert_eq!(fluid.free_indices().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn unknown_substance_and_bad_fraction_are_rejected() {
        let mut fluid = FluidComposition::new(&["N2"]);
        assert!(matches!(
            fluid.set("Xe", 0.5),
            Err(GraphError::Configuration { .. })
        ));
        assert!(fluid.set("N2", 1.5).is_err());
        assert!(fluid.set("N2", f64::NAN).is_err());
        assert!(!fluid.get("N2").unwrap().is_set);
    }

    #[test]
    fn normalize_without_free_values_splits_evenly() {
        let mut fluid = FluidComposition::new(&["N2", "O2", "Ar"]);
        fluid.set("Ar", 0.1).unwrap();
        fluid.normalize();
        let v = fluid.values();
        assert!((v[0] - 0.45).abs() < 1e-12);
        assert!((v[1] - 0.45).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn normalized_composition_sums_to_one(
            raw in proptest::collection::vec(0.0f64..1.0, 2..6),
            fixed in proptest::collection::vec(any::<bool>(), 6),
            budget in 0.0f64..1.0,
        ) {
            let names: Vec<String> = (0..raw.len()).map(|i| format!("s{i}")).collect();
            let mut fluid = FluidComposition::new(&names);
            // fixed fractions share `budget`; at least one stays free
            let n_fixed = raw.iter().zip(&fixed).take(raw.len() - 1).filter(|(_, f)| **f).count();
            for (i, (_, f)) in raw.iter().zip(&fixed).take(raw.len() - 1).enumerate() {
                if *f {
                    fluid.set(&names[i], budget / n_fixed as f64).unwrap();
                }
            }
            for i in fluid.free_indices().collect::<Vec<_>>() {
                fluid.set_value(i, raw[i]);
            }
            fluid.normalize();
            let sum: f64 = fluid.values().iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9, "sum = {}", sum);
            prop_assert!(fluid.values().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
