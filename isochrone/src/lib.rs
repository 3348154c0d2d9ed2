//! Isochrone sampling, normalization and mixture weighting.
//!
//! This crate turns tabulated stellar evolutionary tracks and an initial mass
//! function into predicted two-band magnitude distributions of a resolved
//! stellar population. It provides:
//!
//! - [`track::Track`]: a validated single-population track with resampling,
//!   mean stellar mass and luminosity, observability under a detection limit
//!   and a horizontal-branch density query
//! - [`composite::CompositeTrack`]: weighted mixtures of tracks, including
//!   stochastic realization of a finite population
//! - [`imf`]: mass-function evaluators
//! - [`selection`]: the shape in which survey detection limits are consumed
//! - [`config`]: explicit, JSON-loadable configuration
//!
//! Parsing of raw track files, photometric errors and survey access live
//! outside this crate; tracks are built from already parsed columns
//! ([`track::TrackTable`] / [`track::TrackData`]).

pub mod composite;
pub mod config;
pub mod error;
pub mod horizontal_branch;
pub mod imf;
pub mod observable;
pub mod sample;
pub mod selection;
pub mod track;

pub use composite::{CompositeTrack, SimulatedStars};
pub use config::{Band, IsochroneConfig};
pub use error::IsochroneError;
pub use imf::{MassFunction, MassFunctionError, MassScale};
pub use observable::MaskNormalization;
pub use sample::SampledPopulation;
pub use selection::{CmdBounds, MaskGrid, SelectionFunction, SparseSelection};
pub use track::{Track, TrackData, TrackMetadata, TrackTable};
