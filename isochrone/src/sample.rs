//! Resampled representation of a track.

use crate::config::Band;

/// Output of [`Track::sample`](crate::track::Track::sample).
///
/// Five aligned sequences, one entry per mass bin (plus any
/// horizontal-branch duplicates). `weight` is the expected number of stars in
/// the bin as a fraction of the track's total expected count above the
/// sampling `mass_min`; it is not normalized to sum to one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledPopulation {
    /// Representative (geometric-mean) initial mass of each bin
    pub mass_init: Vec<f64>,
    pub weight: Vec<f64>,
    /// Present-day mass at the representative initial mass
    pub mass_act: Vec<f64>,
    pub mag_1: Vec<f64>,
    pub mag_2: Vec<f64>,
}

impl SampledPopulation {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mass_init: Vec::with_capacity(capacity),
            weight: Vec::with_capacity(capacity),
            mass_act: Vec::with_capacity(capacity),
            mag_1: Vec::with_capacity(capacity),
            mag_2: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weight.iter().sum()
    }

    /// `mag_1 - mag_2` per entry.
    pub fn color(&self) -> Vec<f64> {
        self.mag_1
            .iter()
            .zip(&self.mag_2)
            .map(|(m1, m2)| m1 - m2)
            .collect()
    }

    /// Magnitudes in the requested band.
    pub fn mag(&self, band: Band) -> &[f64] {
        match band {
            Band::One => &self.mag_1,
            Band::Two => &self.mag_2,
        }
    }

    pub fn push(&mut self, mass_init: f64, weight: f64, mass_act: f64, mag_1: f64, mag_2: f64) {
        self.mass_init.push(mass_init);
        self.weight.push(weight);
        self.mass_act.push(mass_act);
        self.mag_1.push(mag_1);
        self.mag_2.push(mag_2);
    }

    /// Append every entry of `other`, scaling its weights by `scale`.
    pub fn append_scaled(&mut self, other: &SampledPopulation, scale: f64) {
        self.mass_init.extend_from_slice(&other.mass_init);
        self.weight.extend(other.weight.iter().map(|w| w * scale));
        self.mass_act.extend_from_slice(&other.mass_act);
        self.mag_1.extend_from_slice(&other.mag_1);
        self.mag_2.extend_from_slice(&other.mag_2);
    }

    /// Keep only entries whose representative mass exceeds `mass_min`.
    pub fn retain_mass_above(&mut self, mass_min: f64) {
        let keep: Vec<bool> = self.mass_init.iter().map(|&m| m > mass_min).collect();
        for column in [
            &mut self.mass_init,
            &mut self.weight,
            &mut self.mass_act,
            &mut self.mag_1,
            &mut self.mag_2,
        ] {
            let mut flags = keep.iter();
            column.retain(|_| flags.next().copied().unwrap_or(false));
        }
    }
}
