//! Single-population isochrone track.
//!
//! A [`Track`] holds the tabulated properties of one coeval, chemically
//! homogeneous population, ordered by initial mass, together with the mass
//! function that populates it. Everything downstream (resampling, aggregate
//! statistics, observability and the horizontal-branch density) is computed
//! from these arrays on demand.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use isochrone::config::IsochroneConfig;
//! use isochrone::imf::PowerLaw;
//! use isochrone::track::{Track, TrackData};
//!
//! let data = TrackData {
//!     log_age: 10.0,
//!     metallicity: 0.0002,
//!     mass_init: vec![0.1, 0.5, 1.0, 1.5],
//!     mass_act: vec![0.1, 0.5, 1.0, 1.5],
//!     luminosity: vec![0.001, 0.05, 1.0, 5.0],
//!     mag_1: vec![10.0, 8.0, 6.0, 5.0],
//!     mag_2: vec![9.5, 7.6, 5.7, 4.8],
//!     stage: vec![String::new(); 4],
//! };
//! let imf = Arc::new(PowerLaw::normalized(0.0, 0.1, 1.5).unwrap());
//! let track = Track::new(data, IsochroneConfig::default(), imf).unwrap();
//!
//! let population = track.sample(3, 0.1, false).unwrap();
//! assert_eq!(population.len(), 3);
//! assert!((population.total_weight() - 1.0).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use ndarray::ArrayView2;
use pop_math::{convolve2d, diff, geometric_centers, linspace, logspace, LinearInterp};
use serde::{Deserialize, Serialize};

use crate::config::{Band, FieldConfig, IsochroneConfig};
use crate::error::IsochroneError;
use crate::horizontal_branch::{self, HorizontalBranchEnvelope, MIN_DISPERSION};
use crate::imf::{MassFunction, MassScale};
use crate::observable::{self, MaskNormalization};
use crate::sample::SampledPopulation;
use crate::selection::{MaskGrid, SelectionFunction};

/// Solar metallicity (Anders & Grevesse 1989), reference for `[Fe/H]`.
pub const SOLAR_METALLICITY: f64 = 0.019;

/// One named column of a parsed track table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Numeric(Vec<f64>),
    Labels(Vec<String>),
}

/// Track table as delivered by a file parser: scalar metadata plus named
/// columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTable {
    pub log_age: f64,
    /// Metal mass fraction Z
    pub metallicity: f64,
    pub columns: BTreeMap<String, Column>,
}

impl TrackTable {
    pub fn new(log_age: f64, metallicity: f64) -> Self {
        Self {
            log_age,
            metallicity,
            columns: BTreeMap::new(),
        }
    }

    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.insert(name.into(), Column::Numeric(values));
        self
    }

    pub fn with_labels(mut self, name: impl Into<String>, labels: Vec<String>) -> Self {
        self.columns.insert(name.into(), Column::Labels(labels));
        self
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64], IsochroneError> {
        match self.columns.get(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Labels(_)) => Err(IsochroneError::InvalidTrack(format!(
                "column '{name}' holds labels, expected numbers"
            ))),
            None => Err(IsochroneError::InvalidTrack(format!(
                "missing column '{name}'"
            ))),
        }
    }

    /// Labels of a column. An empty numeric column is read as empty labels.
    pub fn labels(&self, name: &str) -> Result<&[String], IsochroneError> {
        match self.columns.get(name) {
            Some(Column::Labels(labels)) => Ok(labels),
            Some(Column::Numeric(values)) if values.is_empty() => Ok(&[]),
            Some(Column::Numeric(_)) => Err(IsochroneError::InvalidTrack(format!(
                "column '{name}' holds numbers, expected labels"
            ))),
            None => Err(IsochroneError::InvalidTrack(format!(
                "missing column '{name}'"
            ))),
        }
    }
}

/// Typed arrays of one track, ordered by initial mass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub log_age: f64,
    pub metallicity: f64,
    pub mass_init: Vec<f64>,
    pub mass_act: Vec<f64>,
    /// Luminosity in solar units (linear)
    pub luminosity: Vec<f64>,
    pub mag_1: Vec<f64>,
    pub mag_2: Vec<f64>,
    /// Evolutionary stage label, empty where the table leaves it blank
    pub stage: Vec<String>,
}

impl TrackData {
    /// Pick the configured columns out of a parsed table.
    pub fn from_table(table: &TrackTable, fields: &FieldConfig) -> Result<Self, IsochroneError> {
        let data = Self {
            log_age: table.log_age,
            metallicity: table.metallicity,
            mass_init: table.numeric(&fields.mass_init_field)?.to_vec(),
            mass_act: table.numeric(&fields.mass_act_field)?.to_vec(),
            luminosity: table.numeric(&fields.luminosity_field)?.to_vec(),
            mag_1: table.numeric(&fields.mag_1_field)?.to_vec(),
            mag_2: table.numeric(&fields.mag_2_field)?.to_vec(),
            stage: table.labels(&fields.stage_field)?.to_vec(),
        };
        data.check_lengths()?;
        Ok(data)
    }

    pub fn len(&self) -> usize {
        self.mass_init.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass_init.is_empty()
    }

    fn check_lengths(&self) -> Result<(), IsochroneError> {
        let n = self.len();
        let lengths = [
            ("mass_act", self.mass_act.len()),
            ("luminosity", self.luminosity.len()),
            ("mag_1", self.mag_1.len()),
            ("mag_2", self.mag_2.len()),
            ("stage", self.stage.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(IsochroneError::InvalidTrack(format!(
                    "{name} has {len} entries, mass_init has {n}"
                )));
            }
        }
        Ok(())
    }
}

/// Age and chemistry of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackMetadata {
    /// log10 of the age in years
    pub log_age: f64,
    /// Age in years
    pub age: f64,
    /// Metal mass fraction Z
    pub metallicity: f64,
    /// `log10(Z / Z_sun)`
    pub feh: f64,
}

impl TrackMetadata {
    pub fn new(log_age: f64, metallicity: f64) -> Result<Self, IsochroneError> {
        if !log_age.is_finite() {
            return Err(IsochroneError::InvalidTrack(format!(
                "log age must be finite, got {log_age}"
            )));
        }
        if !(metallicity.is_finite() && metallicity > 0.0) {
            return Err(IsochroneError::InvalidTrack(format!(
                "metallicity must be positive, got {metallicity}"
            )));
        }
        Ok(Self {
            log_age,
            age: 10f64.powf(log_age),
            metallicity,
            feh: (metallicity / SOLAR_METALLICITY).log10(),
        })
    }
}

/// Replace empty labels with the closest preceding non-empty label.
fn forward_fill(stage: &mut [String]) {
    let mut last: Option<String> = None;
    for label in stage.iter_mut() {
        if label.is_empty() {
            if let Some(previous) = &last {
                label.clone_from(previous);
            }
        } else {
            last = Some(label.clone());
        }
    }
}

/// A validated single-population track.
///
/// Immutable after construction except for the horizontal-branch envelope,
/// which is built on first use and then reused.
#[derive(Debug, Clone)]
pub struct Track {
    metadata: TrackMetadata,
    mass_init: Vec<f64>,
    mass_act: Vec<f64>,
    luminosity: Vec<f64>,
    mag_1: Vec<f64>,
    mag_2: Vec<f64>,
    stage: Vec<String>,
    mass_init_upper_bound: f64,
    tail_index: usize,
    config: IsochroneConfig,
    imf: Arc<dyn MassFunction>,
    envelope: OnceLock<Result<HorizontalBranchEnvelope, String>>,
}

impl Track {
    /// Validate `data` and build a track.
    ///
    /// # Errors
    /// * [`IsochroneError::InsufficientData`] for fewer than two rows
    /// * [`IsochroneError::InvalidTrack`] for misaligned columns, non-finite
    ///   values, non-positive or unsorted initial masses, or bad metadata
    /// * [`IsochroneError::Config`] if `config` does not validate
    pub fn new(
        data: TrackData,
        config: IsochroneConfig,
        imf: Arc<dyn MassFunction>,
    ) -> Result<Self, IsochroneError> {
        config.validate()?;
        let n = data.len();
        if n < 2 {
            return Err(IsochroneError::InsufficientData {
                needed: 2,
                found: n,
            });
        }
        data.check_lengths()?;

        let columns = [
            ("mass_init", &data.mass_init),
            ("mass_act", &data.mass_act),
            ("luminosity", &data.luminosity),
            ("mag_1", &data.mag_1),
            ("mag_2", &data.mag_2),
        ];
        for (name, values) in columns {
            if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                return Err(IsochroneError::InvalidTrack(format!(
                    "{name}[{i}] is not finite"
                )));
            }
        }
        if data.mass_init[0] <= 0.0 {
            return Err(IsochroneError::InvalidTrack(format!(
                "initial masses must be positive, got {}",
                data.mass_init[0]
            )));
        }
        if let Some(i) = data.mass_init.windows(2).position(|w| w[1] <= w[0]) {
            return Err(IsochroneError::InvalidTrack(format!(
                "mass_init must increase strictly, mass_init[{}] = {} follows {}",
                i + 1,
                data.mass_init[i + 1],
                data.mass_init[i]
            )));
        }

        let metadata = TrackMetadata::new(data.log_age, data.metallicity)?;
        let TrackData {
            mass_init,
            mass_act,
            luminosity,
            mag_1,
            mag_2,
            mut stage,
            ..
        } = data;
        forward_fill(&mut stage);

        // Sorted ascending, so the last entry is the maximum
        let mass_init_upper_bound = mass_init[n - 1];
        let tail_index = stage
            .iter()
            .position(|s| *s == config.tail_stage)
            .unwrap_or(n);

        debug!(
            "Track log_age={:.3} Z={:.5}: {} points, tail at {}, mass in [{}, {}]",
            metadata.log_age, metadata.metallicity, n, tail_index, mass_init[0], mass_init_upper_bound
        );

        Ok(Self {
            metadata,
            mass_init,
            mass_act,
            luminosity,
            mag_1,
            mag_2,
            stage,
            mass_init_upper_bound,
            tail_index,
            config,
            imf,
            envelope: OnceLock::new(),
        })
    }

    /// Build a track straight from a parsed table using the configured
    /// column names.
    pub fn from_table(
        table: &TrackTable,
        config: IsochroneConfig,
        imf: Arc<dyn MassFunction>,
    ) -> Result<Self, IsochroneError> {
        let data = TrackData::from_table(table, &config.fields)?;
        Self::new(data, config, imf)
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &IsochroneConfig {
        &self.config
    }

    pub fn imf(&self) -> &Arc<dyn MassFunction> {
        &self.imf
    }

    pub fn len(&self) -> usize {
        self.mass_init.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass_init.is_empty()
    }

    pub fn mass_init(&self) -> &[f64] {
        &self.mass_init
    }

    pub fn mass_act(&self) -> &[f64] {
        &self.mass_act
    }

    pub fn luminosity(&self) -> &[f64] {
        &self.luminosity
    }

    pub fn mag_1(&self) -> &[f64] {
        &self.mag_1
    }

    pub fn mag_2(&self) -> &[f64] {
        &self.mag_2
    }

    /// Stage labels after forward filling.
    pub fn stage(&self) -> &[String] {
        &self.stage
    }

    pub fn mass_init_upper_bound(&self) -> f64 {
        self.mass_init_upper_bound
    }

    /// Index of the first thermal-pulse point, or `len()` if there is none.
    pub fn tail_index(&self) -> usize {
        self.tail_index
    }

    /// `mag_1 - mag_2` per tabulated point.
    pub fn color(&self) -> Vec<f64> {
        self.mag_1
            .iter()
            .zip(&self.mag_2)
            .map(|(m1, m2)| m1 - m2)
            .collect()
    }

    /// Magnitudes in the configured detection band.
    pub fn mag(&self) -> &[f64] {
        match self.config.detection_band {
            Band::One => &self.mag_1,
            Band::Two => &self.mag_2,
        }
    }

    fn check_mass_min(&self, mass_min: f64) -> Result<(), IsochroneError> {
        if !(mass_min.is_finite() && mass_min > 0.0) {
            return Err(IsochroneError::Domain(format!(
                "mass_min must be positive, got {mass_min}"
            )));
        }
        if mass_min >= self.mass_init_upper_bound {
            return Err(IsochroneError::Domain(format!(
                "mass_min {mass_min} is not below the track upper mass bound {}",
                self.mass_init_upper_bound
            )));
        }
        Ok(())
    }

    /// Resample the track into `step_count` mass bins.
    ///
    /// Bin edges follow the density of the tabulation: they are evenly spaced
    /// in array index, not in mass. Each bin is represented by the geometric
    /// mean of its edges and weighted by the expected number of stars it
    /// holds, divided by the expected number of stars between `mass_min` and
    /// the upper mass bound of the whole track.
    ///
    /// # Arguments
    /// * `step_count` - Number of mass bins, at least 1
    /// * `mass_min` - Lower mass bound of the normalization
    /// * `include_tail` - Sample the thermal-pulse tail as well
    ///
    /// # Returns
    /// One entry per bin, followed by shifted copies of horizontal-branch bins
    /// when magnitude dispersion is configured.
    ///
    /// Without the tail, the weights do not add up to one even for
    /// `mass_min` at the tabulated minimum: the tail still counts toward
    /// the normalization.
    pub fn sample(
        &self,
        step_count: usize,
        mass_min: f64,
        include_tail: bool,
    ) -> Result<SampledPopulation, IsochroneError> {
        if step_count == 0 {
            return Err(IsochroneError::Domain(
                "step_count must be at least 1".to_string(),
            ));
        }
        self.check_mass_min(mass_min)?;

        let end = if include_tail {
            self.len()
        } else {
            self.tail_index
        };
        if end < 2 {
            return Err(IsochroneError::InsufficientData {
                needed: 2,
                found: end,
            });
        }

        let mass_init = &self.mass_init[..end];
        let mass_act = LinearInterp::new(mass_init.to_vec(), self.mass_act[..end].to_vec())?;
        let mag_1 = LinearInterp::new(mass_init.to_vec(), self.mag_1[..end].to_vec())?;
        let mag_2 = LinearInterp::new(mass_init.to_vec(), self.mag_2[..end].to_vec())?;

        let index_to_mass = LinearInterp::from_index(mass_init)?;
        let positions = linspace(0.0, (end - 1) as f64, step_count + 1);
        let edges = index_to_mass.eval_many(&positions)?;
        let widths = diff(&edges);
        let centers = geometric_centers(&edges);

        let mut population = SampledPopulation::with_capacity(step_count);
        for (&mass, &width) in centers.iter().zip(&widths) {
            population.push(
                mass,
                width * self.imf.pdf(mass, MassScale::Linear),
                mass_act.eval(mass)?,
                mag_1.eval(mass)?,
                mag_2.eval(mass)?,
            );
        }

        self.broaden_horizontal_branch(&mut population);

        let total = self.imf.integrate(mass_min, self.mass_init_upper_bound)?;
        if !(total > 0.0) {
            return Err(IsochroneError::Domain(format!(
                "mass function has no stars in [{mass_min}, {}]",
                self.mass_init_upper_bound
            )));
        }
        for weight in population.weight.iter_mut() {
            *weight /= total;
        }

        debug!(
            "Sampled {} bins ({} entries) over [{}, {}], total weight {:.6}",
            step_count,
            population.len(),
            mass_init[0],
            mass_init[end - 1],
            population.total_weight()
        );
        Ok(population)
    }

    fn broaden_horizontal_branch(&self, population: &mut SampledPopulation) {
        let hb = &self.config.horizontal_branch;
        if hb.dispersion <= MIN_DISPERSION {
            return;
        }
        let Some(span) = horizontal_branch::mass_span(&self.mass_init, &self.stage, &hb.stage)
        else {
            return;
        };
        let offsets = horizontal_branch::dispersion_offsets(hb.dispersion, hb.spacing);
        horizontal_branch::broaden(population, span, &offsets);
    }

    /// Riemann sum of `quantity(m) · pdf(m, log10)` over `steps` log-spaced
    /// masses from `lo` to the upper mass bound.
    fn log_mass_sum(
        &self,
        quantity: &LinearInterp,
        lo: f64,
        steps: usize,
    ) -> Result<f64, IsochroneError> {
        let hi = self.mass_init_upper_bound;
        let d_log_mass = (hi.log10() - lo.log10()) / steps as f64;
        logspace(lo, hi, steps)
            .into_iter()
            .try_fold(0.0, |total, mass| -> Result<f64, IsochroneError> {
                Ok(total + quantity.eval(mass)? * self.imf.pdf(mass, MassScale::Log10) * d_log_mass)
            })
    }

    /// Mean present-day stellar mass per star (solar masses) for stars born
    /// above `mass_min`.
    ///
    /// Below the tabulated minimum, unevolved stars are assumed to keep
    /// their initial mass.
    pub fn stellar_mass(&self, mass_min: f64, steps: usize) -> Result<f64, IsochroneError> {
        if steps < 2 {
            return Err(IsochroneError::Domain(format!(
                "stellar mass needs at least 2 steps, got {steps}"
            )));
        }
        self.check_mass_min(mass_min)?;

        let mass_act = if mass_min < self.mass_init[0] {
            let mut xs = Vec::with_capacity(self.len() + 1);
            xs.push(mass_min);
            xs.extend_from_slice(&self.mass_init);
            let mut ys = Vec::with_capacity(self.len() + 1);
            ys.push(mass_min);
            ys.extend_from_slice(&self.mass_act);
            LinearInterp::new(xs, ys)?
        } else {
            LinearInterp::new(self.mass_init.clone(), self.mass_act.clone())?
        };
        self.log_mass_sum(&mass_act, mass_min, steps)
    }

    /// Mean luminosity per star (solar units) over the tabulated mass range.
    pub fn stellar_luminosity(&self, steps: usize) -> Result<f64, IsochroneError> {
        if steps < 2 {
            return Err(IsochroneError::Domain(format!(
                "stellar luminosity needs at least 2 steps, got {steps}"
            )));
        }
        let luminosity = LinearInterp::new(self.mass_init.clone(), self.luminosity.clone())?;
        self.log_mass_sum(&luminosity, self.mass_init[0], steps)
    }

    /// Observable weight of the pre-tail population in each interior pixel of
    /// `selection`, for stars born above `mass_min`.
    pub fn observable_fraction(
        &self,
        selection: &dyn SelectionFunction,
        distance_modulus: f64,
        mass_min: f64,
    ) -> Result<Vec<f64>, IsochroneError> {
        let population = self.sample(self.config.sampling.mass_steps, mass_min, false)?;
        observable::observable_weights(
            &population,
            self.config.detection_band,
            selection,
            distance_modulus,
        )
    }

    /// Observable fraction of stars born above `mass_min` in every bin of a
    /// regular mask.
    ///
    /// When `mass_min` lies below the sampled mass range, the map is scaled
    /// by the fraction of stars above `mass_min` that fall inside the sampled
    /// range. Otherwise bins at or below `mass_min` are dropped. With a
    /// `kernel` the map is also convolved with it (`same` window).
    pub fn normalize_with_mask(
        &self,
        grid: &MaskGrid,
        distance_modulus: f64,
        step_count: usize,
        mass_min: f64,
        kernel: Option<ArrayView2<f64>>,
    ) -> Result<MaskNormalization, IsochroneError> {
        if !(mass_min.is_finite() && mass_min > 0.0) {
            return Err(IsochroneError::Domain(format!(
                "mass_min must be positive, got {mass_min}"
            )));
        }
        let mut population = self.sample(step_count, self.config.sampling.mass_min, false)?;

        let (first, last) = population
            .mass_init
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| {
                (lo.min(m), hi.max(m))
            });
        let factor = if mass_min < first {
            if !(first < last) {
                return Err(IsochroneError::Domain(
                    "mass correction needs at least 2 mass bins".to_string(),
                ));
            }
            let sampled = self.imf.integrate(first, last)?;
            let full = self.imf.integrate(mass_min, last)?;
            if full > 0.0 {
                sampled / full
            } else {
                0.0
            }
        } else {
            population.retain_mass_above(mass_min);
            1.0
        };
        if population.total_weight() <= 0.0 {
            warn!("No sampled weight above {mass_min} Msun; mask normalization is zero");
        }

        let (bins_x, bins_y) = (grid.bins_x(), grid.bins_y());
        debug!(
            "Mask normalization over {:?} bins, x [{}, {}], y [{}, {}], mass factor {:.6}",
            grid.shape(),
            bins_x[0],
            bins_x[bins_x.len() - 1],
            bins_y[0],
            bins_y[bins_y.len() - 1],
            factor
        );
        let map = observable::mask_weights(&population, grid, distance_modulus, factor);
        let smoothed = kernel.map(|kernel| convolve2d(&map.view(), &kernel));
        Ok(MaskNormalization { map, smoothed })
    }

    /// Horizontal-branch envelope, built on first use.
    ///
    /// # Errors
    /// [`IsochroneError::Envelope`] when the track has fewer than two
    /// horizontal-branch points or their colours do not increase strictly.
    /// The failure is remembered and reported again on later calls.
    pub fn horizontal_branch_envelope(&self) -> Result<&HorizontalBranchEnvelope, IsochroneError> {
        self.envelope
            .get_or_init(|| {
                self.build_envelope().map_err(|err| match err {
                    IsochroneError::Envelope(msg) => msg,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|msg| IsochroneError::Envelope(msg.clone()))
    }

    fn build_envelope(&self) -> Result<HorizontalBranchEnvelope, IsochroneError> {
        let hb = &self.config.horizontal_branch;
        let mag = self.mag();
        let color = self.color();
        let mut branch_color = Vec::new();
        let mut branch_mag = Vec::new();
        let mut branch_mass = Vec::new();
        for (i, label) in self.stage.iter().enumerate() {
            if *label == hb.stage {
                branch_color.push(color[i]);
                branch_mag.push(mag[i]);
                branch_mass.push(self.mass_init[i]);
            }
        }
        HorizontalBranchEnvelope::build(
            &branch_color,
            &branch_mag,
            &branch_mass,
            hb.envelope_pad,
            self.imf.as_ref(),
        )
    }

    /// Horizontal-branch star density (per mag²) at one colour-magnitude
    /// point.
    pub fn horizontal_branch_density(&self, color: f64, mag: f64) -> Result<f64, IsochroneError> {
        Ok(self.horizontal_branch_envelope()?.density_at(color, mag))
    }

    /// Horizontal-branch star density at each `(colors[i], mags[i])`.
    pub fn horizontal_branch_densities(
        &self,
        colors: &[f64],
        mags: &[f64],
    ) -> Result<Vec<f64>, IsochroneError> {
        if colors.len() != mags.len() {
            return Err(IsochroneError::Domain(format!(
                "{} colours but {} magnitudes",
                colors.len(),
                mags.len()
            )));
        }
        let envelope = self.horizontal_branch_envelope()?;
        Ok(colors
            .iter()
            .zip(mags)
            .map(|(&c, &m)| envelope.density_at(c, m))
            .collect())
    }
}
