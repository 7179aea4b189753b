//! Dense assembly of the sparse derivative triplets and the Newton step.

use nalgebra::{DMatrix, DVector};
use tn_graph::EquationLedger;

use crate::error::{SolverError, SolverResult};

/// Scatter `(row, col, value)` triplets into a dense matrix; duplicates add.
pub fn assemble(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(rows, cols);
    for &(r, c, v) in triplets {
        if r < rows && c < cols {
            jac[(r, c)] += v;
        }
    }
    jac
}

/// Solve `J · Δx = -r` for the current ledger.
pub fn newton_step(
    ledger: &EquationLedger,
    cols: usize,
    iteration: usize,
) -> SolverResult<DVector<f64>> {
    let numerical = |what: String| SolverError::Numerical { iteration, what };

    if let Some(row) = ledger.residuals().iter().position(|r| !r.is_finite()) {
        return Err(numerical(format!("residual of row {row} is not finite")));
    }
    if let Some(&(r, c, _)) = ledger.triplets().iter().find(|t| !t.2.is_finite()) {
        return Err(numerical(format!("derivative at ({r}, {c}) is not finite")));
    }

    let jac = assemble(ledger.rows(), cols, ledger.triplets());
    let rhs = -DVector::from_column_slice(ledger.residuals());
    let dx = jac
        .lu()
        .solve(&rhs)
        .ok_or_else(|| numerical("Jacobian matrix is singular".to_string()))?;
    if dx.iter().any(|v| !v.is_finite()) {
        return Err(numerical("Newton increment is not finite".to_string()));
    }
    Ok(dx)
}
