//! Building the equation system and running the damped Newton iteration.

use std::collections::BTreeMap;

use nalgebra::DVector;
use tn_components::ParamKey;
use tn_core::{CompId, rms};
use tn_graph::{ColumnFilter, ColumnMap, ColumnTarget, EquationLedger, SolveContext};
use tracing::{debug, info, warn};

use crate::error::{SolverError, SolverResult};
use crate::jacobian::newton_step;
use crate::mode::SolveMode;
use crate::network::Network;
use crate::newton::{SolveReport, SolveStatus, damping_factor};

/// Row offsets and column layout of one solve call.
pub(crate) struct EquationSystem {
    columns: ColumnMap,
    /// Extra columns owned by free component parameters.
    params: BTreeMap<usize, (CompId, ParamKey)>,
    conn_rows: Vec<usize>,
    comp_rows: Vec<usize>,
    bus_rows: Vec<Option<usize>>,
    rows: usize,
}

impl EquationSystem {
    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.columns.len()
    }
}

impl Network {
    /// Solve the network in `mode`.
    ///
    /// Configuration problems and numerical failures are errors; running
    /// out of iterations is reported through [`SolveStatus::MaxIterations`]
    /// with the partial state left in place.
    pub fn solve(&mut self, mode: SolveMode) -> SolverResult<SolveReport> {
        info!(
            ?mode,
            connections = self.connections.len(),
            components = self.components.len(),
            "solve started"
        );
        self.check_connectivity()?;
        self.apply_mode(mode)?;
        self.init_starting_values(mode)?;
        let system = self.build()?;
        let report = self.iterate(&system)?;

        if report.converged() {
            self.postprocess()?;
            if mode == SolveMode::Design {
                self.record_design()?;
            }
            info!(
                iterations = report.iterations,
                residual_rms = report.residual_rms,
                adjustments = report.range_adjustments.len(),
                "solve converged"
            );
        } else {
            warn!(
                iterations = report.iterations,
                residual_rms = report.residual_rms,
                "maximum number of iterations reached without convergence"
            );
        }
        Ok(report)
    }

    /// Number of equations and unknowns of the system the current
    /// specification produces; errors when they differ.
    pub fn check_degrees_of_freedom(&mut self) -> SolverResult<(usize, usize)> {
        self.check_connectivity()?;
        let system = self.build()?;
        Ok((system.rows(), system.cols()))
    }

    pub(crate) fn build(&mut self) -> SolverResult<EquationSystem> {
        let num_fluids = self.fluids().len();
        let mut rows = 0;

        let mut conn_rows = Vec::with_capacity(self.connections.len());
        for (_, conn) in self.connections.iter_mut() {
            conn.reset_solved();
            conn.simplify_specifications()?;
            conn_rows.push(rows);
            rows += conn.preprocess();
        }

        let mut comp_rows = Vec::with_capacity(self.components.len());
        for comp in &mut self.components {
            comp_rows.push(rows);
            rows += comp.preprocess(num_fluids, &self.connections)?;
        }

        let mut bus_rows = Vec::with_capacity(self.buses.len());
        for bus in &self.buses {
            if bus.is_set() {
                bus_rows.push(Some(rows));
                rows += 1;
            } else {
                bus_rows.push(None);
            }
        }

        let mut columns = ColumnMap::build(&self.connections);
        let mut params = BTreeMap::new();
        for (i, comp) in self.components.iter_mut().enumerate() {
            let free: Vec<ParamKey> = comp.variable_params().collect();
            for (_, p) in comp.params_mut() {
                p.set_column(None);
            }
            for key in free {
                let col = columns.allocate();
                if let Some(p) = comp.param_mut(key) {
                    p.set_column(Some(col));
                }
                params.insert(col, (CompId::from_index(i as u32), key));
            }
        }

        if rows != columns.len() {
            let hint = if rows > columns.len() {
                "remove specifications"
            } else {
                "add specifications"
            };
            return Err(SolverError::config(format!(
                "the network has {rows} equations for {} unknowns; {hint}",
                columns.len()
            )));
        }
        debug!(rows, "equation system built");

        Ok(EquationSystem {
            columns,
            params,
            conn_rows,
            comp_rows,
            bus_rows,
            rows,
        })
    }

    fn evaluate(
        &self,
        system: &EquationSystem,
        filter: &ColumnFilter,
        ledger: &mut EquationLedger,
    ) -> SolverResult<()> {
        ledger.clear();
        let ctx = SolveContext {
            connections: &self.connections,
            columns: &system.columns,
            filter,
        };
        for ((id, conn), &row) in self.connections.iter().zip(&system.conn_rows) {
            conn.solve(id, &ctx, row, ledger)?;
        }
        for (comp, &row) in self.components.iter().zip(&system.comp_rows) {
            comp.solve(&ctx, row, ledger)?;
        }
        for (bus, row) in self.buses.iter().zip(&system.bus_rows) {
            if let Some(row) = *row {
                bus.solve(&self.components, &ctx, row, ledger)?;
            }
        }
        Ok(())
    }

    /// Valid range of the quantity behind each column.
    fn column_ranges(&self, system: &EquationSystem) -> SolverResult<Vec<f64>> {
        let mut ranges = Vec::with_capacity(system.cols());
        for (col, target) in system.columns.targets().iter().enumerate() {
            let range = match *target {
                ColumnTarget::MassFlow(id) => {
                    let c = &self.connections.get(id)?.m;
                    c.max - c.min
                }
                ColumnTarget::Pressure(id) => {
                    let c = &self.connections.get(id)?.p;
                    c.max - c.min
                }
                ColumnTarget::Enthalpy(id) => self
                    .connections
                    .get(id)?
                    .enthalpy_window()
                    .map_or(f64::INFINITY, |(lo, hi)| hi - lo),
                ColumnTarget::Fraction(..) => 1.0,
                ColumnTarget::Extra => system
                    .params
                    .get(&col)
                    .and_then(|(comp, key)| self.components.get(comp.slot())?.param(*key))
                    .map_or(f64::INFINITY, |p| p.range()),
            };
            ranges.push(range);
        }
        Ok(ranges)
    }

    fn apply_increments(&mut self, system: &EquationSystem, dx: &DVector<f64>) -> SolverResult<()> {
        for (col, target) in system.columns.targets().iter().enumerate() {
            let d = dx[col];
            match *target {
                ColumnTarget::MassFlow(id) => self.connections.get_mut(id)?.m.val_si += d,
                ColumnTarget::Pressure(id) => self.connections.get_mut(id)?.p.val_si += d,
                ColumnTarget::Enthalpy(id) => self.connections.get_mut(id)?.h.val_si += d,
                ColumnTarget::Fraction(id, i) => {
                    let fluid = self.connections.get_mut(id)?.fluid_mut();
                    let y = fluid.entries().get(i).map_or(0.0, |e| e.val);
                    fluid.set_value(i, y + d);
                }
                ColumnTarget::Extra => {
                    let Some(&(comp, key)) = system.params.get(&col) else {
                        continue;
                    };
                    if let Some(p) = self
                        .components
                        .get_mut(comp.slot())
                        .and_then(|c| c.param_mut(key))
                    {
                        p.val = p.clamp(p.val + d);
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn iterate(&mut self, system: &EquationSystem) -> SolverResult<SolveReport> {
        let config = self.config().clone();
        let cols = system.cols();
        let mut filter = ColumnFilter::all(cols);
        let mut ledger = EquationLedger::new(system.rows());
        let mut adjustments = Vec::new();
        let mut iteration = 0;

        loop {
            for (_, conn) in self.connections.iter_mut() {
                conn.simplify_specifications()?;
            }
            self.evaluate(system, &filter, &mut ledger)?;
            let residual_rms = rms(ledger.residuals());
            if !residual_rms.is_finite() {
                return Err(SolverError::Numerical {
                    iteration,
                    what: "residual is not finite".to_string(),
                });
            }

            let done = iteration >= config.min_iterations || cols == 0;
            if residual_rms < config.tolerance && done {
                return Ok(SolveReport {
                    status: SolveStatus::Converged,
                    iterations: iteration,
                    residual_rms,
                    range_adjustments: adjustments,
                });
            }
            if iteration >= config.max_iterations {
                return Ok(SolveReport {
                    status: SolveStatus::MaxIterations,
                    iterations: iteration,
                    residual_rms,
                    range_adjustments: adjustments,
                });
            }

            let dx = newton_step(&ledger, cols, iteration)?;
            let alpha = damping_factor(&dx, &self.column_ranges(system)?, config.max_step_fraction);
            let step = dx * alpha;
            self.apply_increments(system, &step)?;
            debug!(iteration, residual_rms, damping = alpha, "newton iteration");

            for (_, conn) in self.connections.iter_mut() {
                adjustments.extend(conn.check_bounds());
            }
            if config.increment_filter {
                filter = ColumnFilter::from_increments(&system.columns, step.as_slice());
            }
            iteration += 1;
        }
    }

    /// Derived connection properties, component parameters and bus totals.
    fn postprocess(&mut self) -> SolverResult<()> {
        for (_, conn) in self.connections.iter_mut() {
            conn.calc_results()?;
        }
        for comp in &mut self.components {
            comp.calc_parameters(&self.connections)?;
        }
        for bus in &mut self.buses {
            bus.calc_results(&self.components, &self.connections)?;
        }
        Ok(())
    }

    /// Remember the converged state as the design point.
    fn record_design(&mut self) -> SolverResult<()> {
        for (_, conn) in self.connections.iter_mut() {
            conn.record_design();
        }
        for comp in &mut self.components {
            comp.record_design();
        }
        self.design_state = Some(self.state()?);
        info!("design point recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::DVector;
    use tn_components::{ComponentAttr, ComponentKind};
    use tn_fluids::{ClausiusClapeyronWrapper, FluidRegistry};
    use tn_graph::{ConnectionAttr, MASS_FLOW_LIMIT, PropKey};

    use super::*;

    #[test]
    fn enthalpy_and_mass_flow_steps_are_limited_by_their_ranges() {
        let registry = FluidRegistry::new().with(ClausiusClapeyronWrapper::water());
        let mut nw = Network::new(Arc::new(registry), &["water"]).unwrap();
        let so = nw.add_component("source", ComponentKind::Source).unwrap();
        let v = nw.add_component("valve", ComponentKind::Valve).unwrap();
        let si = nw.add_component("sink", ComponentKind::Sink).unwrap();
        let c1 = nw.connect("c1", so, "out1", v, "in1").unwrap();
        nw.connect("c2", v, "out1", si, "in1").unwrap();
        nw.set_conn_attr(
            c1,
            [
                ConnectionAttr::fluid([("water", 1.0)]),
                ConnectionAttr::property(PropKey::M, 1.0),
                ConnectionAttr::property(PropKey::P, 5e5),
                ConnectionAttr::property(PropKey::T, 300.0),
            ],
        )
        .unwrap();
        nw.set_comp_attr(v, [ComponentAttr::param(ParamKey::Pr, 0.8)])
            .unwrap();

        nw.init_starting_values(SolveMode::Design).unwrap();
        let system = nw.build().unwrap();
        let ranges = nw.column_ranges(&system).unwrap();
        let targets = system.columns.targets();
        assert!(targets.iter().any(|t| matches!(t, ColumnTarget::Enthalpy(_))));

        let mut dx = DVector::zeros(system.cols());
        for (col, target) in targets.iter().enumerate() {
            match *target {
                ColumnTarget::Enthalpy(id) => {
                    let (lo, hi) = nw.connection(id).unwrap().enthalpy_window().unwrap();
                    assert_eq!(ranges[col], hi - lo);
                    dx[col] = 10.0 * ranges[col];
                }
                ColumnTarget::MassFlow(_) => {
                    assert_eq!(ranges[col], 2.0 * MASS_FLOW_LIMIT);
                }
                _ => {}
            }
        }
        // 0.5 * range / (10 * range)
        assert!((damping_factor(&dx, &ranges, 0.5) - 0.05).abs() < 1e-12);
    }
}
