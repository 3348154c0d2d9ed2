//! Initial mass functions.
//!
//! A [`MassFunction`] is the only physical input a track needs besides its
//! tabulation: it turns a bin of initial mass into an expected number of
//! stars. Tracks share one evaluator through an `Arc<dyn MassFunction>`.
//!
//! # Available models
//!
//! - [`PowerLaw`] - `c · m^α` on a finite support; `α = 0` is a uniform mass
//!   function and [`PowerLaw::salpeter`] is the classic `α = -2.35`.
//! - [`Kroupa2001`] - broken power law with the break at 0.5 M☉.
//! - [`Chabrier2003`] - lognormal system IMF below 1 M☉ joined to a power law.

use std::f64::consts::LN_10;
use std::fmt::Debug;
use std::sync::Arc;

use pop_math::{logspace, trapezoid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of log-spaced points used by the numerical default of
/// [`MassFunction::integrate`].
pub const DEFAULT_INTEGRATION_POINTS: usize = 4096;

/// Errors produced by mass-function evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MassFunctionError {
    #[error("mass must be positive, got {0}")]
    NonPositiveMass(f64),

    #[error("invalid integration range [{0}, {1}]")]
    InvalidRange(f64, f64),

    #[error("invalid mass function parameter: {0}")]
    InvalidParameter(String),
}

/// Scale in which a density is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassScale {
    /// dN/dM
    Linear,
    /// dN/dlog10(M)
    Log10,
}

/// Density of stars over initial stellar mass (solar masses).
pub trait MassFunction: Send + Sync + Debug {
    /// Linear-mass density dN/dM. Zero outside the support and for
    /// non-positive mass.
    fn density(&self, mass: f64) -> f64;

    /// Interval outside of which [`density`](Self::density) vanishes.
    fn support(&self) -> (f64, f64);

    /// Density in the requested scale.
    ///
    /// In `Log10` mode this is `density(m) · m · ln 10`, so that a sum of
    /// `pdf(m, Log10) · Δlog10(m)` approximates the expected count.
    fn pdf(&self, mass: f64, scale: MassScale) -> f64 {
        match scale {
            MassScale::Linear => self.density(mass),
            MassScale::Log10 => self.density(mass) * mass * LN_10,
        }
    }

    /// Expected count over `[lo, hi]`.
    ///
    /// The default integrates `pdf(m, Log10)` with the trapezoid rule on a
    /// log-spaced grid restricted to the support.
    fn integrate(&self, lo: f64, hi: f64) -> Result<f64, MassFunctionError> {
        check_range(lo, hi)?;
        let (support_lo, support_hi) = self.support();
        let lo = lo.max(support_lo);
        let hi = hi.min(support_hi);
        if lo >= hi {
            return Ok(0.0);
        }

        let masses = logspace(lo, hi, DEFAULT_INTEGRATION_POINTS);
        let log_masses: Vec<f64> = masses.iter().map(|m| m.log10()).collect();
        let values: Vec<f64> = masses
            .iter()
            .map(|&m| self.pdf(m, MassScale::Log10))
            .collect();
        Ok(trapezoid(&log_masses, &values))
    }
}

fn check_range(lo: f64, hi: f64) -> Result<(), MassFunctionError> {
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(MassFunctionError::InvalidRange(lo, hi));
    }
    if lo <= 0.0 {
        return Err(MassFunctionError::NonPositiveMass(lo));
    }
    if hi <= 0.0 {
        return Err(MassFunctionError::NonPositiveMass(hi));
    }
    if lo >= hi {
        return Err(MassFunctionError::InvalidRange(lo, hi));
    }
    Ok(())
}

fn check_support(lower: f64, upper: f64) -> Result<(), MassFunctionError> {
    if !(lower.is_finite() && upper.is_finite() && lower > 0.0 && lower < upper) {
        return Err(MassFunctionError::InvalidParameter(format!(
            "support must satisfy 0 < lower < upper, got [{lower}, {upper}]"
        )));
    }
    Ok(())
}

/// Integral of `m^alpha` over `[lo, hi]`.
fn power_integral(alpha: f64, lo: f64, hi: f64) -> f64 {
    if (alpha + 1.0).abs() < 1e-12 {
        (hi / lo).ln()
    } else {
        let a1 = alpha + 1.0;
        (hi.powf(a1) - lo.powf(a1)) / a1
    }
}

/// Single power law `coefficient · m^alpha` on `[lower, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLaw {
    pub coefficient: f64,
    pub alpha: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PowerLaw {
    /// Power law with an explicit coefficient (not normalized).
    pub fn with_coefficient(
        coefficient: f64,
        alpha: f64,
        lower: f64,
        upper: f64,
    ) -> Result<Self, MassFunctionError> {
        check_support(lower, upper)?;
        if !(coefficient.is_finite() && coefficient >= 0.0 && alpha.is_finite()) {
            return Err(MassFunctionError::InvalidParameter(format!(
                "coefficient {coefficient} and exponent {alpha} must be finite, coefficient non-negative"
            )));
        }
        Ok(Self {
            coefficient,
            alpha,
            lower,
            upper,
        })
    }

    /// Power law scaled to unit integral over its support.
    pub fn normalized(alpha: f64, lower: f64, upper: f64) -> Result<Self, MassFunctionError> {
        check_support(lower, upper)?;
        let total = power_integral(alpha, lower, upper);
        Self::with_coefficient(1.0 / total, alpha, lower, upper)
    }

    /// Salpeter (1955) slope on [0.1, 100] M☉.
    pub fn salpeter() -> Self {
        let total = power_integral(-2.35, 0.1, 100.0);
        Self {
            coefficient: 1.0 / total,
            alpha: -2.35,
            lower: 0.1,
            upper: 100.0,
        }
    }
}

impl MassFunction for PowerLaw {
    fn density(&self, mass: f64) -> f64 {
        if mass < self.lower || mass > self.upper || mass <= 0.0 {
            return 0.0;
        }
        self.coefficient * mass.powf(self.alpha)
    }

    fn support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn integrate(&self, lo: f64, hi: f64) -> Result<f64, MassFunctionError> {
        check_range(lo, hi)?;
        let lo = lo.max(self.lower);
        let hi = hi.min(self.upper);
        if lo >= hi {
            return Ok(0.0);
        }
        Ok(self.coefficient * power_integral(self.alpha, lo, hi))
    }
}

/// Kroupa (2001) broken power law, normalized over `[lower, upper]`.
///
/// `dN/dM ∝ M^-1.3` below 0.5 M☉ and `∝ M^-2.3` above, continuous at the
/// break.
#[derive(Debug, Clone, PartialEq)]
pub struct Kroupa2001 {
    lower: f64,
    upper: f64,
    norm: f64,
}

impl Kroupa2001 {
    const BREAK: f64 = 0.5;
    const ALPHA_LOW: f64 = -1.3;
    const ALPHA_HIGH: f64 = -2.3;

    pub fn new(lower: f64, upper: f64) -> Result<Self, MassFunctionError> {
        check_support(lower, upper)?;
        let mut imf = Self {
            lower,
            upper,
            norm: 1.0,
        };
        imf.norm = 1.0 / imf.raw_integral(lower, upper);
        Ok(imf)
    }

    /// Scale of the high-mass segment that keeps the density continuous.
    fn high_scale() -> f64 {
        Self::BREAK.powf(Self::ALPHA_LOW - Self::ALPHA_HIGH)
    }

    fn raw_density(mass: f64) -> f64 {
        if mass < Self::BREAK {
            mass.powf(Self::ALPHA_LOW)
        } else {
            Self::high_scale() * mass.powf(Self::ALPHA_HIGH)
        }
    }

    fn raw_integral(&self, lo: f64, hi: f64) -> f64 {
        let mut total = 0.0;
        if lo < Self::BREAK {
            total += power_integral(Self::ALPHA_LOW, lo, hi.min(Self::BREAK));
        }
        if hi > Self::BREAK {
            total += Self::high_scale() * power_integral(Self::ALPHA_HIGH, lo.max(Self::BREAK), hi);
        }
        total
    }
}

impl MassFunction for Kroupa2001 {
    fn density(&self, mass: f64) -> f64 {
        if mass < self.lower || mass > self.upper || mass <= 0.0 {
            return 0.0;
        }
        self.norm * Self::raw_density(mass)
    }

    fn support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn integrate(&self, lo: f64, hi: f64) -> Result<f64, MassFunctionError> {
        check_range(lo, hi)?;
        let lo = lo.max(self.lower);
        let hi = hi.min(self.upper);
        if lo >= hi {
            return Ok(0.0);
        }
        Ok(self.norm * self.raw_integral(lo, hi))
    }
}

/// Chabrier (2003) system IMF, normalized over `[lower, upper]`.
///
/// Lognormal in `log10(M)` below 1 M☉ (characteristic mass 0.079 M☉,
/// width 0.69 dex) and `dN/dlog10(M) ∝ M^-1.3` above, joined continuously.
#[derive(Debug, Clone, PartialEq)]
pub struct Chabrier2003 {
    lower: f64,
    upper: f64,
    norm: f64,
}

impl Chabrier2003 {
    const CHARACTERISTIC_MASS: f64 = 0.079;
    const SIGMA: f64 = 0.69;
    const SLOPE_HIGH: f64 = -1.3;

    pub fn new(lower: f64, upper: f64) -> Result<Self, MassFunctionError> {
        check_support(lower, upper)?;
        let unnormalized = Self {
            lower,
            upper,
            norm: 1.0,
        };
        let total = MassFunction::integrate(&unnormalized, lower, upper)?;
        if !(total > 0.0) {
            return Err(MassFunctionError::InvalidParameter(format!(
                "mass function vanishes on [{lower}, {upper}]"
            )));
        }
        Ok(Self {
            norm: 1.0 / total,
            ..unnormalized
        })
    }

    /// dN/dlog10(M) before normalization.
    fn raw_log_density(mass: f64) -> f64 {
        let lognormal = |m: f64| {
            let x = m.log10() - Self::CHARACTERISTIC_MASS.log10();
            (-x * x / (2.0 * Self::SIGMA * Self::SIGMA)).exp()
        };
        if mass <= 1.0 {
            lognormal(mass)
        } else {
            lognormal(1.0) * mass.powf(Self::SLOPE_HIGH)
        }
    }
}

impl Default for Chabrier2003 {
    fn default() -> Self {
        let unnormalized = Self {
            lower: 0.1,
            upper: 100.0,
            norm: 1.0,
        };
        let total = MassFunction::integrate(&unnormalized, 0.1, 100.0).unwrap_or(1.0);
        Self {
            norm: 1.0 / total,
            ..unnormalized
        }
    }
}

impl MassFunction for Chabrier2003 {
    fn density(&self, mass: f64) -> f64 {
        if mass < self.lower || mass > self.upper || mass <= 0.0 {
            return 0.0;
        }
        self.norm * Self::raw_log_density(mass) / (mass * LN_10)
    }

    fn support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

/// Mass-function selection as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImfKind {
    Chabrier2003 { lower: f64, upper: f64 },
    Kroupa2001 { lower: f64, upper: f64 },
    PowerLaw { alpha: f64, lower: f64, upper: f64 },
}

impl Default for ImfKind {
    fn default() -> Self {
        ImfKind::Chabrier2003 {
            lower: 0.1,
            upper: 100.0,
        }
    }
}

impl ImfKind {
    /// Instantiate the selected (normalized) mass function.
    pub fn build(&self) -> Result<Arc<dyn MassFunction>, MassFunctionError> {
        Ok(match *self {
            ImfKind::Chabrier2003 { lower, upper } => Arc::new(Chabrier2003::new(lower, upper)?),
            ImfKind::Kroupa2001 { lower, upper } => Arc::new(Kroupa2001::new(lower, upper)?),
            ImfKind::PowerLaw {
                alpha,
                lower,
                upper,
            } => Arc::new(PowerLaw::normalized(alpha, lower, upper)?),
        })
    }
}
