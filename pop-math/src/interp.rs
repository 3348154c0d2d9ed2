//! Piecewise-linear interpolation with explicit domain handling.
//!
//! Interpolants in this crate never extrapolate silently. Evaluating outside
//! the tabulated range either returns [`InterpError::OutOfBounds`] or, for the
//! `*_or` variants, a caller supplied fill value.

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

/// How strictly the abscissae of a [`LinearInterp`] must increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ordering {
    Strict,
    NonDecreasing,
}

fn validate(xs: &[f64], ys: &[f64], ordering: Ordering) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    let sorted = xs.windows(2).all(|w| match ordering {
        Ordering::Strict => w[1] > w[0],
        Ordering::NonDecreasing => w[1] >= w[0],
    });
    if !sorted {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Evaluate on pre-validated knots. `x` must lie inside `[xs[0], xs[n-1]]`.
///
/// `partition_point` returns the first knot strictly greater than `x`, so the
/// selected segment always has non-zero width even when knots repeat.
fn eval_unchecked(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let idx = xs.partition_point(|&val| val <= x);

    if idx == 0 {
        return ys[0];
    }
    if idx == xs.len() {
        return ys[xs.len() - 1];
    }

    let x1 = xs[idx - 1];
    let x2 = xs[idx];
    let y1 = ys[idx - 1];
    let y2 = ys[idx];

    let t = (x - x1) / (x2 - x1);
    y1 + t * (y2 - y1)
}

/// Reusable piecewise-linear interpolant.
///
/// Knots are validated once at construction so repeated evaluation costs a
/// single binary search.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterp {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterp {
    /// Build an interpolant whose abscissae are strictly increasing.
    ///
    /// This is the constructor for physical domains (e.g. stellar mass),
    /// where a repeated abscissa means the tabulation is corrupt.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        validate(&xs, &ys, Ordering::Strict)?;
        Ok(Self { xs, ys })
    }

    /// Build an interpolant that tolerates repeated abscissae.
    ///
    /// Used to invert cumulative curves, which are flat wherever the
    /// underlying weight is zero. Zero-width segments are never selected.
    pub fn non_decreasing(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        validate(&xs, &ys, Ordering::NonDecreasing)?;
        Ok(Self { xs, ys })
    }

    /// Interpolant mapping array position `0..len` to the given values.
    pub fn from_index(values: &[f64]) -> Result<Self, InterpError> {
        let xs = (0..values.len()).map(|i| i as f64).collect();
        Self::new(xs, values.to_vec())
    }

    /// Domain `(min, max)` of the interpolant.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Check whether `x` lies inside the domain (inclusive).
    pub fn contains(&self, x: f64) -> bool {
        let (lo, hi) = self.domain();
        x >= lo && x <= hi
    }

    /// Evaluate at `x`, failing outside the domain.
    pub fn eval(&self, x: f64) -> Result<f64, InterpError> {
        if !self.contains(x) {
            let (lo, hi) = self.domain();
            return Err(InterpError::OutOfBounds(x, lo, hi));
        }
        Ok(eval_unchecked(x, &self.xs, &self.ys))
    }

    /// Evaluate at `x`, returning `fill` outside the domain.
    pub fn eval_or(&self, x: f64, fill: f64) -> f64 {
        if self.contains(x) {
            eval_unchecked(x, &self.xs, &self.ys)
        } else {
            fill
        }
    }

    /// Evaluate at every point of `xs`, failing on the first out-of-domain value.
    pub fn eval_many(&self, xs: &[f64]) -> Result<Vec<f64>, InterpError> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}
