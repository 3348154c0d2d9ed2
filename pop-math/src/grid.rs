//! Grids and simple quadrature.
//!
//! Evenly spaced grids are built from the index (`start + i * step`) rather
//! than by repeated addition, and the final point is pinned to `stop`, so
//! grid endpoints coincide exactly with the requested bounds.

/// `n` evenly spaced points over `[start, stop]`, endpoints included.
///
/// Returns `[start]` for `n == 1` and an empty vector for `n == 0`.
///
/// # Examples
///
/// ```rust
/// use pop_math::grid::linspace;
///
/// assert_eq!(linspace(0.0, 3.0, 4), vec![0.0, 1.0, 2.0, 3.0]);
/// ```
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// `n` points evenly spaced in `log10` between `start` and `stop` (both > 0).
///
/// The endpoints are returned exactly as given rather than as
/// `10^log10(x)`, which may round outside the original range.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let mut out: Vec<f64> = linspace(start.log10(), stop.log10(), n)
        .into_iter()
        .map(|l| 10f64.powf(l))
        .collect();
    if let Some(first) = out.first_mut() {
        *first = start;
    }
    if n > 1 {
        out[n - 1] = stop;
    }
    out
}

/// Differences between adjacent points (`len - 1` values).
pub fn diff(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Geometric mean of each pair of adjacent edges.
///
/// Each centre is clamped to its own bin so floating point rounding can
/// never push it outside the edges.
pub fn geometric_centers(edges: &[f64]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|w| (w[0] * w[1]).sqrt().clamp(w[0], w[1]))
        .collect()
}

/// Running sum with a leading zero (`len + 1` values).
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len() + 1);
    let mut total = 0.0;
    out.push(total);
    for &v in values {
        total += v;
        out.push(total);
    }
    out
}

/// Trapezoid rule over tabulated `(xs, ys)`.
///
/// Returns 0.0 when fewer than two points are supplied.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}
