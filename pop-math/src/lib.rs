//! pop-math - Numerical building blocks for isochrone population synthesis
//!
//! This crate provides the small set of numerical tools the `isochrone`
//! crate is built on:
//!
//! - **Interpolation** - Checked piecewise-linear interpolation that never extrapolates
//! - **Grids** - Linear/logarithmic grids, geometric bin centres, cumulative sums
//! - **Quadrature** - Trapezoid rule over tabulated samples
//! - **Convolution** - 2D convolution of spatial maps with a smoothing kernel
//!
//! # Example
//!
//! ```rust
//! use pop_math::{linspace, LinearInterp};
//!
//! let mass = LinearInterp::from_index(&[0.1, 0.5, 1.0, 1.5]).unwrap();
//! let edges: Vec<f64> = linspace(0.0, 3.0, 7)
//!     .into_iter()
//!     .map(|i| mass.eval(i).unwrap())
//!     .collect();
//! assert_eq!(edges.len(), 7);
//! ```

pub mod convolve2d;
pub mod grid;
pub mod interp;

pub use convolve2d::{convolve2d, gaussian_kernel};
pub use grid::{cumulative_sum, diff, geometric_centers, linspace, logspace, trapezoid};
pub use interp::{InterpError, LinearInterp};
