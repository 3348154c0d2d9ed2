//! Survey selection functions consumed by observability queries.
//!
//! The survey's detection model itself is defined elsewhere; this module only
//! fixes the shape in which detection limits are handed to a track. Two forms
//! exist: a sparse list of interior pixels ([`SelectionFunction`]) and a
//! regular spatial binning ([`MaskGrid`]).

use ndarray::Array2;

use crate::config::Band;
use crate::error::IsochroneError;

/// Global colour-magnitude window (open intervals).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmdBounds {
    /// Apparent magnitude range in the detection band
    pub mag: (f64, f64),
    /// Colour (`mag_1 - mag_2`) range
    pub color: (f64, f64),
}

impl CmdBounds {
    pub fn new(mag: (f64, f64), color: (f64, f64)) -> Result<Self, IsochroneError> {
        for (name, (lo, hi)) in [("magnitude", mag), ("colour", color)] {
            if !(lo < hi) {
                return Err(IsochroneError::Selection(format!(
                    "{name} bounds must satisfy lo < hi, got ({lo}, {hi})"
                )));
            }
        }
        Ok(Self { mag, color })
    }

    pub fn contains(&self, mag: f64, color: f64) -> bool {
        self.mag.0 < mag && mag < self.mag.1 && self.color.0 < color && color < self.color.1
    }
}

/// Per-pixel detection limits over the interior of a region of interest.
pub trait SelectionFunction {
    /// Pixel identifiers, in output order.
    fn interior_pixels(&self) -> &[u64];

    /// Limiting magnitude of each interior pixel in `band`, aligned with
    /// [`interior_pixels`](Self::interior_pixels).
    fn detection_limits(&self, band: Band) -> &[f64];

    fn cmd_bounds(&self) -> CmdBounds;
}

/// Owned [`SelectionFunction`] over an explicit pixel list.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseSelection {
    pixels: Vec<u64>,
    limits_1: Vec<f64>,
    limits_2: Vec<f64>,
    bounds: CmdBounds,
}

impl SparseSelection {
    pub fn new(
        pixels: Vec<u64>,
        limits_1: Vec<f64>,
        limits_2: Vec<f64>,
        bounds: CmdBounds,
    ) -> Result<Self, IsochroneError> {
        if limits_1.len() != pixels.len() || limits_2.len() != pixels.len() {
            return Err(IsochroneError::Selection(format!(
                "{} pixels but {} and {} detection limits",
                pixels.len(),
                limits_1.len(),
                limits_2.len()
            )));
        }
        Ok(Self {
            pixels,
            limits_1,
            limits_2,
            bounds,
        })
    }
}

impl SelectionFunction for SparseSelection {
    fn interior_pixels(&self) -> &[u64] {
        &self.pixels
    }

    fn detection_limits(&self, band: Band) -> &[f64] {
        match band {
            Band::One => &self.limits_1,
            Band::Two => &self.limits_2,
        }
    }

    fn cmd_bounds(&self) -> CmdBounds {
        self.bounds
    }
}

/// Detection depth on a regular spatial binning.
///
/// Depth arrays are indexed `[y, x]` and have one entry per bin, i.e. shape
/// `(bins_y.len() - 1, bins_x.len() - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    bins_x: Vec<f64>,
    bins_y: Vec<f64>,
    depth_1: Array2<f64>,
    depth_2: Array2<f64>,
}

impl MaskGrid {
    pub fn new(
        bins_x: Vec<f64>,
        bins_y: Vec<f64>,
        depth_1: Array2<f64>,
        depth_2: Array2<f64>,
    ) -> Result<Self, IsochroneError> {
        for (axis, edges) in [("x", &bins_x), ("y", &bins_y)] {
            if edges.len() < 2 {
                return Err(IsochroneError::Selection(format!(
                    "{axis} binning needs at least 2 edges, found {}",
                    edges.len()
                )));
            }
            if edges.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(IsochroneError::Selection(format!(
                    "{axis} bin edges must increase strictly"
                )));
            }
        }

        let shape = (bins_y.len() - 1, bins_x.len() - 1);
        for (band, depth) in [(1, &depth_1), (2, &depth_2)] {
            if depth.dim() != shape {
                return Err(IsochroneError::Selection(format!(
                    "band {band} depth has shape {:?}, expected {:?}",
                    depth.dim(),
                    shape
                )));
            }
        }

        Ok(Self {
            bins_x,
            bins_y,
            depth_1,
            depth_2,
        })
    }

    /// Grid with the same depth in every bin.
    pub fn uniform(
        bins_x: Vec<f64>,
        bins_y: Vec<f64>,
        depth_1: f64,
        depth_2: f64,
    ) -> Result<Self, IsochroneError> {
        let shape = (
            bins_y.len().saturating_sub(1),
            bins_x.len().saturating_sub(1),
        );
        Self::new(
            bins_x,
            bins_y,
            Array2::from_elem(shape, depth_1),
            Array2::from_elem(shape, depth_2),
        )
    }

    /// `(rows, cols)` = `(y bins, x bins)`
    pub fn shape(&self) -> (usize, usize) {
        self.depth_1.dim()
    }

    pub fn bins_x(&self) -> &[f64] {
        &self.bins_x
    }

    pub fn bins_y(&self) -> &[f64] {
        &self.bins_y
    }

    pub fn depth(&self, band: Band) -> &Array2<f64> {
        match band {
            Band::One => &self.depth_1,
            Band::Two => &self.depth_2,
        }
    }
}
