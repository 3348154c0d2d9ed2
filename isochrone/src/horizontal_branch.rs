//! Horizontal-branch magnitude scatter and colour-magnitude envelope.
//!
//! Two separate pieces live here. [`dispersion_offsets`] and [`broaden`]
//! spread the weight of resampled horizontal-branch bins over a discrete set
//! of magnitude offsets. [`HorizontalBranchEnvelope`] describes the region of
//! the colour-magnitude diagram occupied by the tabulated branch and assigns a
//! uniform star density (per mag²) inside it.

use log::debug;
use pop_math::LinearInterp;

use crate::error::IsochroneError;
use crate::imf::MassFunction;
use crate::sample::SampledPopulation;

/// Dispersion at or below this value disables broadening.
pub const MIN_DISPERSION: f64 = 1e-3;

/// Odd, symmetric magnitude offsets covering `[-dispersion, +dispersion]`.
///
/// The count is `floor(2 · dispersion / spacing)` bumped to the next odd
/// number, so the spacing between offsets is never below `spacing` (except
/// when a single offset remains). Offsets are built from integer multiples and
/// the middle one is exactly `0.0`.
///
/// ```rust
/// use isochrone::horizontal_branch::dispersion_offsets;
///
/// assert_eq!(dispersion_offsets(0.1, 0.05), vec![-0.1, -0.05, 0.0, 0.05, 0.1]);
/// assert_eq!(dispersion_offsets(0.01, 0.05), vec![0.0]);
/// ```
pub fn dispersion_offsets(dispersion: f64, spacing: f64) -> Vec<f64> {
    let mut n = (2.0 * dispersion / spacing).floor().max(0.0) as usize;
    if n % 2 == 0 {
        n += 1;
    }
    let half = (n - 1) / 2;
    if half == 0 {
        return vec![0.0];
    }
    let step = dispersion / half as f64;
    (-(half as i64)..=half as i64)
        .map(|k| k as f64 * step)
        .collect()
}

/// Initial-mass span `(min, max)` of the tabulated points carrying `label`.
pub fn mass_span(mass_init: &[f64], stage: &[String], label: &str) -> Option<(f64, f64)> {
    mass_init
        .iter()
        .zip(stage)
        .filter(|(_, s)| s.as_str() == label)
        .fold(None, |span, (&m, _)| match span {
            None => Some((m, m)),
            Some((lo, hi)) => Some((f64::min(lo, m), f64::max(hi, m))),
        })
}

/// Spread the weight of every bin whose representative mass lies strictly
/// inside `span` across `offsets`.
///
/// The weight of each such bin is divided by `offsets.len()` in place (that
/// entry is the zero-offset copy) and a shifted duplicate is appended for
/// every non-zero offset. Returns the number of bins that were broadened.
pub fn broaden(population: &mut SampledPopulation, span: (f64, f64), offsets: &[f64]) -> usize {
    let (lo, hi) = span;
    let selected: Vec<usize> = population
        .mass_init
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m > lo && m < hi)
        .map(|(i, _)| i)
        .collect();
    if selected.is_empty() {
        return 0;
    }

    let n = offsets.len() as f64;
    for &i in &selected {
        population.weight[i] /= n;
    }

    for &offset in offsets.iter().filter(|&&o| o != 0.0) {
        for &i in &selected {
            let (mass_init, weight, mass_act) = (
                population.mass_init[i],
                population.weight[i],
                population.mass_act[i],
            );
            let (mag_1, mag_2) = (population.mag_1[i] + offset, population.mag_2[i] + offset);
            population.push(mass_init, weight, mass_act, mag_1, mag_2);
        }
    }

    debug!(
        "Broadened {} horizontal branch bins over {} offsets",
        selected.len(),
        offsets.len()
    );
    selected.len()
}

/// Padded colour-magnitude envelope of the tabulated horizontal branch.
#[derive(Debug, Clone)]
pub struct HorizontalBranchEnvelope {
    lower: LinearInterp,
    upper: LinearInterp,
    density: f64,
}

impl HorizontalBranchEnvelope {
    /// Build the envelope from the horizontal-branch points of a track.
    ///
    /// # Arguments
    /// * `color` - Colour of each branch point, strictly increasing
    /// * `mag` - Detection-band magnitude of each branch point
    /// * `mass_init` - Initial mass of each branch point
    /// * `pad` - Magnitude margin above and below the branch
    /// * `imf` - Mass function giving the number of branch stars
    ///
    /// # Errors
    /// [`IsochroneError::Envelope`] when fewer than two points are given or
    /// the colours are not strictly increasing.
    pub fn build(
        color: &[f64],
        mag: &[f64],
        mass_init: &[f64],
        pad: f64,
        imf: &dyn MassFunction,
    ) -> Result<Self, IsochroneError> {
        if color.len() < 2 {
            return Err(IsochroneError::Envelope(format!(
                "need at least 2 horizontal branch points, found {}",
                color.len()
            )));
        }
        if color.len() != mag.len() || color.len() != mass_init.len() {
            return Err(IsochroneError::Envelope(
                "horizontal branch arrays differ in length".to_string(),
            ));
        }
        if let Some(w) = color.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(IsochroneError::Envelope(format!(
                "horizontal branch colour must increase strictly, found {} followed by {}",
                w[0], w[1]
            )));
        }

        let lower = LinearInterp::new(color.to_vec(), mag.iter().map(|m| m - pad).collect())?;
        let upper = LinearInterp::new(color.to_vec(), mag.iter().map(|m| m + pad).collect())?;

        let last = color.len() - 1;
        let count = imf.integrate(mass_init[0], mass_init[last])?;
        let density = count / (2.0 * pad * (color[last] - color[0]));

        Ok(Self {
            lower,
            upper,
            density,
        })
    }

    /// Uniform density inside the envelope (stars per mag²).
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Density at a colour-magnitude point; zero outside the envelope.
    ///
    /// Outside the tabulated colour range both envelopes evaluate to 0, which
    /// leaves an empty magnitude interval.
    pub fn density_at(&self, color: f64, mag: f64) -> f64 {
        let lower = self.lower.eval_or(color, 0.0);
        let upper = self.upper.eval_or(color, 0.0);
        if mag > lower && mag < upper {
            self.density
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imf::PowerLaw;
    use approx::assert_relative_eq;

    #[test]
    fn test_offsets_are_odd_and_centred() {
        for (dispersion, spacing) in [(0.1, 0.025), (0.3, 0.07), (0.05, 0.02), (1.0, 0.3)] {
            let offsets = dispersion_offsets(dispersion, spacing);
            assert_eq!(offsets.len() % 2, 1);
            assert_eq!(offsets[offsets.len() / 2], 0.0);
            assert_relative_eq!(offsets[0], -dispersion, epsilon = 1e-12);
            assert_relative_eq!(offsets[offsets.len() - 1], dispersion, epsilon = 1e-12);
            for w in offsets.windows(2) {
                assert!(w[1] - w[0] >= spacing - 1e-12);
            }
        }
    }

    #[test]
    fn test_offsets_even_count_bumped() {
        // floor(0.1 / 0.025) = 4 -> 5 offsets
        let offsets = dispersion_offsets(0.05, 0.025);
        assert_eq!(offsets.len(), 5);
        assert_relative_eq!(offsets[1], -0.025, epsilon = 1e-15);
    }

    #[test]
    fn test_mass_span() {
        let mass = vec![0.5, 0.6, 0.7, 0.8];
        let stage: Vec<String> = ["MS", "BHeb", "BHeb", "EAGB"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(mass_span(&mass, &stage, "BHeb"), Some((0.6, 0.7)));
        assert_eq!(mass_span(&mass, &stage, "LTP"), None);
    }

    #[test]
    fn test_broaden_conserves_weight() {
        let mut population = SampledPopulation::default();
        population.push(0.55, 0.4, 0.55, 5.0, 4.5);
        population.push(0.65, 0.3, 0.60, 1.0, 0.6);
        population.push(0.66, 0.2, 0.61, 0.9, 0.5);
        population.push(0.75, 0.1, 0.70, 0.0, -0.8);
        let before = population.clone();

        let offsets = dispersion_offsets(0.1, 0.05);
        let broadened = broaden(&mut population, (0.6, 0.7), &offsets);

        assert_eq!(broadened, 2);
        assert_eq!(population.len(), 4 + 2 * 4);
        assert_relative_eq!(population.total_weight(), before.total_weight(), epsilon = 1e-12);

        // Bins outside the span are untouched
        assert_eq!(population.weight[0], 0.4);
        assert_eq!(population.weight[3], 0.1);

        // Zero-offset copy keeps the undispersed magnitudes
        assert_eq!(population.mag_1[1], before.mag_1[1]);
        assert_eq!(population.mag_2[2], before.mag_2[2]);

        // Copies of the first broadened bin add back up to its original weight
        let copies: f64 = population
            .mass_init
            .iter()
            .zip(&population.weight)
            .filter(|&(&m, _)| m == 0.65)
            .map(|(_, w)| w)
            .sum();
        assert_relative_eq!(copies, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_broaden_single_offset_is_identity() {
        let mut population = SampledPopulation::default();
        population.push(0.65, 0.3, 0.60, 1.0, 0.6);
        let before = population.clone();
        broaden(&mut population, (0.6, 0.7), &[0.0]);
        assert_eq!(population, before);
    }

    #[test]
    fn test_envelope_density() {
        let imf = PowerLaw::normalized(0.0, 0.1, 1.5).unwrap();
        let color = vec![-0.2, 0.0, 0.3];
        let mag = vec![0.6, 0.5, 0.7];
        let mass = vec![0.80, 0.81, 0.82];
        let envelope = HorizontalBranchEnvelope::build(&color, &mag, &mass, 0.5, &imf).unwrap();

        // integrate(0.80, 0.82) / (2 * 0.5 * 0.5)
        let expected = (0.02 / 1.4) / 0.5;
        assert_relative_eq!(envelope.density(), expected, epsilon = 1e-12);
        assert_relative_eq!(envelope.density_at(0.0, 0.5), expected, epsilon = 1e-12);
        assert_eq!(envelope.density_at(0.0, 1.0), 0.0);
        assert_eq!(envelope.density_at(0.0, 0.0), 0.0);
        assert_eq!(envelope.density_at(0.5, 0.5), 0.0);
    }

    #[test]
    fn test_envelope_preconditions() {
        let imf = PowerLaw::salpeter();
        let err = HorizontalBranchEnvelope::build(&[0.1], &[0.5], &[0.8], 0.5, &imf).unwrap_err();
        assert!(matches!(err, IsochroneError::Envelope(_)));

        let err = HorizontalBranchEnvelope::build(
            &[0.1, 0.0, 0.3],
            &[0.5, 0.5, 0.5],
            &[0.80, 0.81, 0.82],
            0.5,
            &imf,
        )
        .unwrap_err();
        assert!(matches!(err, IsochroneError::Envelope(msg) if msg.contains("increase")));
    }
}
