//! Weighted mixtures of single-population tracks.
//!
//! A [`CompositeTrack`] describes a population made of several coeval
//! components (for example a spread in age or metallicity). Every aggregate is
//! the weight-averaged aggregate of its members; [`CompositeTrack::simulate`]
//! draws a finite set of stars from the combined sample.

use log::{info, warn};
use pop_math::{cumulative_sum, LinearInterp};
use rand::Rng;

use crate::error::IsochroneError;
use crate::sample::SampledPopulation;
use crate::selection::SelectionFunction;
use crate::track::Track;

/// Fill value of the inverse cumulative curve outside its domain.
const OUT_OF_RANGE_INDEX: f64 = -1.0;

/// Largest number of stars a single call to [`CompositeTrack::simulate`] draws.
pub const MAX_SIMULATED_STARS: usize = 100_000_000;

/// Apparent magnitudes of a simulated set of stars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedStars {
    pub mag_1: Vec<f64>,
    pub mag_2: Vec<f64>,
}

impl SimulatedStars {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mag_1: Vec::with_capacity(capacity),
            mag_2: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.mag_1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mag_1.is_empty()
    }
}

/// Tracks combined with weights that sum to one.
#[derive(Debug, Clone)]
pub struct CompositeTrack {
    weights: Vec<f64>,
    tracks: Vec<Track>,
}

impl CompositeTrack {
    /// Combine `tracks` with the given relative `weights`.
    ///
    /// Weights are rescaled to sum to one. All members must use the same
    /// detection band and magnitude columns, and mass functions with the same
    /// support. Only the support is compared; members are expected to share
    /// one mass-function family.
    pub fn new(weights: Vec<f64>, tracks: Vec<Track>) -> Result<Self, IsochroneError> {
        if weights.len() != tracks.len() {
            return Err(IsochroneError::Domain(format!(
                "{} weights for {} tracks",
                weights.len(),
                tracks.len()
            )));
        }
        let Some(first) = tracks.first() else {
            return Err(IsochroneError::Domain(
                "a composite needs at least one track".to_string(),
            ));
        };
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
            return Err(IsochroneError::Domain(format!(
                "weights must be finite and non-negative, got {w}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(IsochroneError::Domain(
                "weights must not all be zero".to_string(),
            ));
        }

        let reference = first.config();
        let support = first.imf().support();
        for (i, track) in tracks.iter().enumerate().skip(1) {
            let config = track.config();
            if config.detection_band != reference.detection_band
                || config.fields.mag_1_field != reference.fields.mag_1_field
                || config.fields.mag_2_field != reference.fields.mag_2_field
            {
                return Err(IsochroneError::Config(format!(
                    "track {i} does not share the photometric bands of track 0"
                )));
            }
            if track.imf().support() != support {
                return Err(IsochroneError::Config(format!(
                    "track {i} mass function support {:?} differs from {support:?}",
                    track.imf().support()
                )));
            }
        }

        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self { weights, tracks })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn members(&self) -> impl Iterator<Item = (f64, &Track)> {
        self.weights.iter().copied().zip(&self.tracks)
    }

    /// Concatenated member samples, each member's weights scaled by its
    /// mixture weight.
    pub fn sample(
        &self,
        step_count: usize,
        mass_min: f64,
        include_tail: bool,
    ) -> Result<SampledPopulation, IsochroneError> {
        let mut population = SampledPopulation::default();
        for (weight, track) in self.members() {
            let member = track.sample(step_count, mass_min, include_tail)?;
            population.append_scaled(&member, weight);
        }
        Ok(population)
    }

    /// Weighted mean of the members' [`Track::stellar_mass`].
    pub fn stellar_mass(&self, mass_min: f64, steps: usize) -> Result<f64, IsochroneError> {
        let mut total = 0.0;
        for (weight, track) in self.members() {
            total += weight * track.stellar_mass(mass_min, steps)?;
        }
        Ok(total)
    }

    /// Weighted mean of the members' [`Track::stellar_luminosity`].
    pub fn stellar_luminosity(&self, steps: usize) -> Result<f64, IsochroneError> {
        let mut total = 0.0;
        for (weight, track) in self.members() {
            total += weight * track.stellar_luminosity(steps)?;
        }
        Ok(total)
    }

    /// Weighted sum of the members' per-pixel observable fractions.
    pub fn observable_fraction(
        &self,
        selection: &dyn SelectionFunction,
        distance_modulus: f64,
        mass_min: f64,
    ) -> Result<Vec<f64>, IsochroneError> {
        let mut total = vec![0.0; selection.interior_pixels().len()];
        for (weight, track) in self.members() {
            let fraction = track.observable_fraction(selection, distance_modulus, mass_min)?;
            for (t, f) in total.iter_mut().zip(fraction) {
                *t += weight * f;
            }
        }
        Ok(total)
    }

    /// Weighted sum of the members' horizontal-branch densities.
    pub fn horizontal_branch_density(&self, color: f64, mag: f64) -> Result<f64, IsochroneError> {
        let mut total = 0.0;
        for (weight, track) in self.members() {
            total += weight * track.horizontal_branch_density(color, mag)?;
        }
        Ok(total)
    }

    pub fn horizontal_branch_densities(
        &self,
        colors: &[f64],
        mags: &[f64],
    ) -> Result<Vec<f64>, IsochroneError> {
        let mut total = vec![0.0; colors.len()];
        for (weight, track) in self.members() {
            let density = track.horizontal_branch_densities(colors, mags)?;
            for (t, d) in total.iter_mut().zip(density) {
                *t += weight * d;
            }
        }
        Ok(total)
    }

    /// Draw a finite population of total stellar mass `stellar_mass`
    /// (solar masses) at `distance_modulus`.
    ///
    /// The expected number of stars is `stellar_mass` divided by the mean
    /// stellar mass of the mixture. Each star picks a sample bin with
    /// probability proportional to its weight, by inverting the cumulative
    /// weight curve. Sampling resolutions come from the first member's
    /// configuration.
    ///
    /// # Errors
    /// [`IsochroneError::Domain`] for a negative or non-finite mass, or when
    /// the expected number of stars exceeds [`MAX_SIMULATED_STARS`].
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        stellar_mass: f64,
        distance_modulus: f64,
        rng: &mut R,
    ) -> Result<SimulatedStars, IsochroneError> {
        if !(stellar_mass.is_finite() && stellar_mass >= 0.0) {
            return Err(IsochroneError::Domain(format!(
                "stellar mass must be finite and non-negative, got {stellar_mass}"
            )));
        }
        if stellar_mass == 0.0 {
            return Ok(SimulatedStars::default());
        }

        let sampling = &self.tracks[0].config().sampling;
        let mean_mass = self.stellar_mass(sampling.mass_min, sampling.integration_steps)?;
        if !(mean_mass > 0.0) {
            return Err(IsochroneError::Domain(format!(
                "mean stellar mass must be positive, got {mean_mass}"
            )));
        }
        let expected = (stellar_mass / mean_mass).round();
        if !(expected <= MAX_SIMULATED_STARS as f64) {
            return Err(IsochroneError::Domain(format!(
                "{stellar_mass} Msun is {expected} stars, above the limit of {MAX_SIMULATED_STARS}"
            )));
        }
        let n_stars = expected as usize;

        let population = self.sample(sampling.mass_steps, sampling.mass_min, false)?;
        let cdf = cumulative_sum(&population.weight);
        let total = cdf[cdf.len() - 1];
        if !(total > 0.0) {
            warn!("Mixture sample carries no weight; no stars simulated");
            return Ok(SimulatedStars::default());
        }

        let positions = (0..cdf.len()).map(|i| i as f64).collect();
        let inverse = LinearInterp::non_decreasing(cdf, positions)?;

        let mut stars = SimulatedStars::with_capacity(n_stars);
        for _ in 0..n_stars {
            let draw = rng.gen::<f64>() * total;
            let position = inverse.eval_or(draw, OUT_OF_RANGE_INDEX).floor();
            if position < 0.0 || position >= population.len() as f64 {
                continue;
            }
            let index = position as usize;
            stars.mag_1.push(population.mag_1[index] + distance_modulus);
            stars.mag_2.push(population.mag_2[index] + distance_modulus);
        }

        info!(
            "Simulated {} stars ({} expected) for {:.1} Msun at m-M={:.2}",
            stars.len(),
            n_stars,
            stellar_mass,
            distance_modulus
        );
        Ok(stars)
    }
}
