//! Error types for isochrone construction and evaluation.

use pop_math::InterpError;
use thiserror::Error;

use crate::imf::MassFunctionError;

/// Errors produced by tracks, composites and their collaborators.
///
/// Precondition violations are reported through distinct variants so callers
/// can tell a bad argument (`Domain`) from a short tabulation
/// (`InsufficientData`) or an unusable horizontal branch (`Envelope`).
#[derive(Error, Debug)]
pub enum IsochroneError {
    #[error("domain error: {0}")]
    Domain(String),

    #[error("insufficient data: need at least {needed} points, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("horizontal branch envelope unavailable: {0}")]
    Envelope(String),

    #[error("invalid track data: {0}")]
    InvalidTrack(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid selection function: {0}")]
    Selection(String),

    #[error(transparent)]
    Interp(#[from] InterpError),

    #[error(transparent)]
    MassFunction(#[from] MassFunctionError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
