/// Floating point type used throughout system
pub type Real = f64;

/// Convergence tolerance of the network solver and the threshold below which
/// a mass fraction counts as absent.
pub const ERR: Real = 1e-6;

/// Root mean square of a residual vector; zero for an empty system.
pub fn rms(values: &[Real]) -> Real {
    if values.is_empty() {
        return 0.0;
    }
    let sum: Real = values.iter().map(|v| v * v).sum();
    (sum / values.len() as Real).sqrt()
}

/// Symmetric finite difference `(f(x + d) - f(x - d)) / 2d`.
pub fn central_difference<E, F>(mut f: F, x: Real, d: Real) -> Result<Real, E>
where
    F: FnMut(Real) -> Result<Real, E>,
{
    let upper = f(x + d)?;
    let lower = f(x - d)?;
    Ok((upper - lower) / (2.0 * d))
}
