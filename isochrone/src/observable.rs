//! Observability of a sampled population under a detection limit.
//!
//! These functions work on an already sampled population so that single
//! tracks and mixtures share them. Magnitudes are absolute; the distance
//! modulus is added before every comparison.

use ndarray::{Array2, Zip};
use rayon::prelude::*;

use crate::config::Band;
use crate::error::IsochroneError;
use crate::sample::SampledPopulation;
use crate::selection::{MaskGrid, SelectionFunction};

/// Output of [`Track::normalize_with_mask`](crate::track::Track::normalize_with_mask).
#[derive(Debug, Clone, PartialEq)]
pub struct MaskNormalization {
    /// Observable weight per spatial bin, indexed `[y, x]`
    pub map: Array2<f64>,
    /// `map` convolved with the smoothing kernel, when one was supplied
    pub smoothed: Option<Array2<f64>>,
}

/// Weights of the population that fall inside the selection's colour-magnitude
/// window; entries outside it are zeroed.
pub fn prefilter_weights(
    population: &SampledPopulation,
    band: Band,
    selection: &dyn SelectionFunction,
    distance_modulus: f64,
) -> Vec<f64> {
    let bounds = selection.cmd_bounds();
    population
        .weight
        .iter()
        .zip(population.mag(band))
        .zip(population.color())
        .map(|((&w, &mag), color)| {
            if bounds.contains(mag + distance_modulus, color) {
                w
            } else {
                0.0
            }
        })
        .collect()
}

/// Observable weight per interior pixel.
///
/// A sample counts toward a pixel when it passes the colour-magnitude window
/// and is brighter than that pixel's limit in both bands. The output follows
/// the order of [`SelectionFunction::interior_pixels`]. Pixels are evaluated
/// in parallel.
pub fn observable_weights(
    population: &SampledPopulation,
    band: Band,
    selection: &dyn SelectionFunction,
    distance_modulus: f64,
) -> Result<Vec<f64>, IsochroneError> {
    let pixel_count = selection.interior_pixels().len();
    let limits_1 = selection.detection_limits(Band::One);
    let limits_2 = selection.detection_limits(Band::Two);
    if limits_1.len() != pixel_count || limits_2.len() != pixel_count {
        return Err(IsochroneError::Selection(format!(
            "{pixel_count} interior pixels but {} and {} detection limits",
            limits_1.len(),
            limits_2.len()
        )));
    }

    let weights = prefilter_weights(population, band, selection, distance_modulus);

    // Survivors of the 1-D cut, already shifted to apparent magnitude
    let candidates: Vec<(f64, f64, f64)> = weights
        .iter()
        .zip(population.mag_1.iter().zip(&population.mag_2))
        .filter(|&(&w, _)| w > 0.0)
        .map(|(&w, (&m1, &m2))| (w, m1 + distance_modulus, m2 + distance_modulus))
        .collect();

    Ok(limits_1
        .par_iter()
        .zip(limits_2.par_iter())
        .map(|(&limit_1, &limit_2)| {
            candidates
                .iter()
                .filter(|&&(_, m1, m2)| m1 < limit_1 && m2 < limit_2)
                .map(|&(w, _, _)| w)
                .sum::<f64>()
        })
        .collect())
}

/// Observable weight per bin of a regular mask, scaled by `factor`.
///
/// Bins are evaluated in parallel.
pub fn mask_weights(
    population: &SampledPopulation,
    grid: &MaskGrid,
    distance_modulus: f64,
    factor: f64,
) -> Array2<f64> {
    let samples: Vec<(f64, f64, f64)> = population
        .weight
        .iter()
        .zip(population.mag_1.iter().zip(&population.mag_2))
        .map(|(&w, (&m1, &m2))| (w, m1 + distance_modulus, m2 + distance_modulus))
        .collect();

    let mut map = Array2::zeros(grid.shape());
    Zip::from(&mut map)
        .and(grid.depth(Band::One))
        .and(grid.depth(Band::Two))
        .par_for_each(|out, &depth_1, &depth_2| {
            let total: f64 = samples
                .iter()
                .filter(|&&(_, m1, m2)| m1 < depth_1 && m2 < depth_2)
                .map(|&(w, _, _)| w)
                .sum();
            *out = factor * total;
        });
    map
}
