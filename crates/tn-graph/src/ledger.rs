//! Per-solve bookkeeping: column layout, residual/derivative ledger and the
//! derivative filter.
//!
//! All of it is rebuilt on every solve call and owned by that call.

use tn_core::ConnId;

use crate::registry::ConnectionRegistry;

/// Columns of one connection's unknowns; `None` for fixed quantities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnColumns {
    pub m: Option<usize>,
    pub p: Option<usize>,
    pub h: Option<usize>,
    /// Indexed like the connection's composition.
    pub fluid: Vec<Option<usize>>,
}

impl ConnColumns {
    /// `(substance index, column)` of every free fraction.
    pub fn fluid_columns(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.fluid
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|c| (i, c)))
    }

    pub fn fraction(&self, index: usize) -> Option<usize> {
        self.fluid.get(index).copied().flatten()
    }
}

static NO_COLUMNS: ConnColumns = ConnColumns {
    m: None,
    p: None,
    h: None,
    fluid: Vec::new(),
};

/// What a column of the Newton system stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnTarget {
    MassFlow(ConnId),
    Pressure(ConnId),
    Enthalpy(ConnId),
    Fraction(ConnId, usize),
    /// Allocated by a caller for its own unknowns.
    Extra,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnMap {
    conns: Vec<ConnColumns>,
    targets: Vec<ColumnTarget>,
}

impl ColumnMap {
    /// Assign m, p, h and the free fractions of every connection, in id order.
    pub fn build(connections: &ConnectionRegistry) -> Self {
        let mut map = Self::default();
        for (id, conn) in connections.iter() {
            let mut cols = ConnColumns::default();
            if conn.m.is_unknown() {
                cols.m = Some(map.push(ColumnTarget::MassFlow(id)));
            }
            if conn.p.is_unknown() {
                cols.p = Some(map.push(ColumnTarget::Pressure(id)));
            }
            if conn.h.is_unknown() {
                cols.h = Some(map.push(ColumnTarget::Enthalpy(id)));
            }
            cols.fluid = conn
                .fluid()
                .entries()
                .iter()
                .enumerate()
                .map(|(i, e)| (!e.is_set).then(|| map.push(ColumnTarget::Fraction(id, i))))
                .collect();
            map.conns.push(cols);
        }
        map
    }

    fn push(&mut self, target: ColumnTarget) -> usize {
        self.targets.push(target);
        self.targets.len() - 1
    }

    /// Reserve one more column.
    pub fn allocate(&mut self) -> usize {
        self.push(ColumnTarget::Extra)
    }

    pub fn connection(&self, id: ConnId) -> &ConnColumns {
        self.conns.get(id.slot()).unwrap_or(&NO_COLUMNS)
    }

    pub fn target(&self, col: usize) -> Option<ColumnTarget> {
        self.targets.get(col).copied()
    }

    pub fn targets(&self) -> &[ColumnTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Skips provider derivatives for columns whose last increment was zero.
#[derive(Clone, Debug, Default)]
pub struct ColumnFilter {
    skip: Vec<bool>,
}

impl ColumnFilter {
    /// Evaluate every column.
    pub fn all(columns: usize) -> Self {
        Self {
            skip: vec![false; columns],
        }
    }

    /// Skip fraction columns that did not move in the last step.
    pub fn from_increments(columns: &ColumnMap, increments: &[f64]) -> Self {
        Self {
            skip: columns
                .targets()
                .iter()
                .zip(increments)
                .map(|(t, dx)| matches!(t, ColumnTarget::Fraction(..)) && *dx == 0.0)
                .collect(),
        }
    }

    pub fn evaluates(&self, col: usize) -> bool {
        !self.skip.get(col).copied().unwrap_or(false)
    }
}

/// Residuals and sparse Jacobian entries of one Newton round.
#[derive(Clone, Debug, Default)]
pub struct EquationLedger {
    residuals: Vec<f64>,
    triplets: Vec<(usize, usize, f64)>,
}

impl EquationLedger {
    pub fn new(rows: usize) -> Self {
        Self {
            residuals: vec![0.0; rows],
            triplets: Vec::new(),
        }
    }

    /// Zero every residual and drop all derivatives.
    pub fn clear(&mut self) {
        self.residuals.iter_mut().for_each(|r| *r = 0.0);
        self.triplets.clear();
    }

    pub fn rows(&self) -> usize {
        self.residuals.len()
    }

    pub fn set_residual(&mut self, row: usize, value: f64) {
        if let Some(r) = self.residuals.get_mut(row) {
            *r = value;
        }
    }

    /// Add `value` at `(row, col)`; fixed quantities (`None`) are skipped.
    pub fn add(&mut self, row: usize, col: Option<usize>, value: f64) {
        if let Some(col) = col {
            self.triplets.push((row, col, value));
        }
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }
}

/// Read-only view handed to every equation contributor.
#[derive(Clone, Copy, Debug)]
pub struct SolveContext<'a> {
    pub connections: &'a ConnectionRegistry,
    pub columns: &'a ColumnMap,
    pub filter: &'a ColumnFilter,
}

impl<'a> SolveContext<'a> {
    /// Whether a provider derivative for `col` should be evaluated.
    pub fn evaluates(&self, col: Option<usize>) -> bool {
        col.is_some_and(|c| self.filter.evaluates(c))
    }
}
