//! Explicit, validated configuration for track construction.
//!
//! Everything a track needs beyond its tabulated arrays is collected here and
//! handed over once at construction: column names expected from the parser,
//! horizontal-branch parameters, the tail stage label, the detection band and
//! default sampling resolutions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IsochroneError;
use crate::imf::ImfKind;

/// Photometric band of a two-band track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    #[default]
    One,
    Two,
}

/// Column names the parsing collaborator must deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub mass_init_field: String,
    pub mass_act_field: String,
    pub luminosity_field: String,
    pub mag_1_field: String,
    pub mag_2_field: String,
    pub stage_field: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            mass_init_field: "M_ini".to_string(),
            mass_act_field: "M_act".to_string(),
            luminosity_field: "L/Lo".to_string(),
            mag_1_field: "g".to_string(),
            mag_2_field: "r".to_string(),
            stage_field: "stage".to_string(),
        }
    }
}

impl FieldConfig {
    fn names(&self) -> [(&'static str, &str); 6] {
        [
            ("mass_init_field", &self.mass_init_field),
            ("mass_act_field", &self.mass_act_field),
            ("luminosity_field", &self.luminosity_field),
            ("mag_1_field", &self.mag_1_field),
            ("mag_2_field", &self.mag_2_field),
            ("stage_field", &self.stage_field),
        ]
    }

    /// Every field must be named, and no two fields may share a column.
    pub fn validate(&self) -> Result<(), IsochroneError> {
        let names = self.names();
        for (key, name) in &names {
            if name.trim().is_empty() {
                return Err(IsochroneError::Config(format!("{key} must not be empty")));
            }
        }
        for (i, (key_a, a)) in names.iter().enumerate() {
            for (key_b, b) in &names[i + 1..] {
                if a == b {
                    return Err(IsochroneError::Config(format!(
                        "{key_a} and {key_b} both refer to column '{a}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Horizontal-branch broadening and envelope parameters (magnitudes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalBranchConfig {
    /// Half-width of the intrinsic magnitude scatter; values at or below
    /// 1e-3 disable broadening.
    pub dispersion: f64,
    /// Minimum spacing between discrete magnitude offsets.
    pub spacing: f64,
    /// Stage label marking horizontal-branch points.
    pub stage: String,
    /// Magnitude margin around the tabulated branch for the density envelope.
    pub envelope_pad: f64,
}

impl Default for HorizontalBranchConfig {
    fn default() -> Self {
        Self {
            dispersion: 0.0,
            spacing: 0.025,
            stage: "BHeb".to_string(),
            envelope_pad: 0.5,
        }
    }
}

impl HorizontalBranchConfig {
    pub fn validate(&self) -> Result<(), IsochroneError> {
        if !(self.dispersion.is_finite() && self.dispersion >= 0.0) {
            return Err(IsochroneError::Config(format!(
                "horizontal branch dispersion must be finite and non-negative, got {}",
                self.dispersion
            )));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(IsochroneError::Config(format!(
                "horizontal branch spacing must be positive, got {}",
                self.spacing
            )));
        }
        if !(self.envelope_pad.is_finite() && self.envelope_pad > 0.0) {
            return Err(IsochroneError::Config(format!(
                "horizontal branch envelope pad must be positive, got {}",
                self.envelope_pad
            )));
        }
        if self.stage.trim().is_empty() {
            return Err(IsochroneError::Config(
                "horizontal branch stage label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default resolutions used when a caller does not pass them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Number of mass bins for `sample`.
    pub mass_steps: usize,
    /// Lower mass bound of the normalization (solar masses).
    pub mass_min: f64,
    /// Number of log-mass points for stellar mass and luminosity sums.
    pub integration_steps: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mass_steps: 1000,
            mass_min: 0.1,
            integration_steps: 10000,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), IsochroneError> {
        if self.mass_steps == 0 {
            return Err(IsochroneError::Config("mass_steps must be at least 1".to_string()));
        }
        if self.integration_steps < 2 {
            return Err(IsochroneError::Config(
                "integration_steps must be at least 2".to_string(),
            ));
        }
        if !(self.mass_min.is_finite() && self.mass_min > 0.0) {
            return Err(IsochroneError::Config(format!(
                "mass_min must be positive, got {}",
                self.mass_min
            )));
        }
        Ok(())
    }
}

/// Complete track configuration.
///
/// # Example
///
/// ```rust
/// use isochrone::config::{Band, IsochroneConfig};
///
/// let config: IsochroneConfig = serde_json::from_str(
///     r#"{ "detection_band": "two", "horizontal_branch": { "dispersion": 0.1 } }"#,
/// )
/// .unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.detection_band, Band::Two);
/// assert_eq!(config.horizontal_branch.stage, "BHeb");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsochroneConfig {
    pub fields: FieldConfig,
    pub horizontal_branch: HorizontalBranchConfig,
    /// Stage label of the first post-main-track thermal-pulse point.
    pub tail_stage: String,
    pub detection_band: Band,
    pub sampling: SamplingConfig,
    pub imf: ImfKind,
}

impl Default for IsochroneConfig {
    fn default() -> Self {
        Self {
            fields: FieldConfig::default(),
            horizontal_branch: HorizontalBranchConfig::default(),
            tail_stage: "LTP".to_string(),
            detection_band: Band::default(),
            sampling: SamplingConfig::default(),
            imf: ImfKind::default(),
        }
    }
}

impl IsochroneConfig {
    pub fn validate(&self) -> Result<(), IsochroneError> {
        self.fields.validate()?;
        self.horizontal_branch.validate()?;
        self.sampling.validate()?;
        if self.tail_stage.trim().is_empty() {
            return Err(IsochroneError::Config(
                "tail stage label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self, IsochroneError> {
        let json = std::fs::read_to_string(path).map_err(|source| IsochroneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
