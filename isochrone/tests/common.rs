//! Common fixtures for isochrone tests
#![allow(dead_code)]

use std::sync::Arc;

use isochrone::imf::{Chabrier2003, MassFunction};
use isochrone::{CmdBounds, IsochroneConfig, SparseSelection, Track, TrackTable};

/// Old, metal-poor track from the lower main sequence to the thermal pulses.
///
/// Rows 7-9 form the horizontal branch (colours -0.1, 0.1, 0.3) and the tail
/// starts at row 11.
pub fn fixture_table() -> TrackTable {
    let stage = ["MS", "", "", "", "SGB", "RGB", "", "BHeb", "", "", "EAGB", "LTP", ""];
    TrackTable::new(10.1, 0.0002)
        .with_numeric(
            "M_ini",
            vec![
                0.10, 0.30, 0.50, 0.70, 0.78, 0.800, 0.805, 0.810, 0.812, 0.814, 0.816, 0.818,
                0.820,
            ],
        )
        .with_numeric(
            "M_act",
            vec![
                0.10, 0.30, 0.50, 0.70, 0.78, 0.79, 0.79, 0.65, 0.65, 0.64, 0.60, 0.55, 0.53,
            ],
        )
        .with_numeric(
            "L/Lo",
            vec![
                0.001, 0.01, 0.05, 0.3, 1.5, 30.0, 300.0, 50.0, 50.0, 55.0, 1000.0, 3000.0,
                5000.0,
            ],
        )
        .with_numeric(
            "g",
            vec![
                14.0, 10.5, 8.0, 5.5, 4.0, 1.5, -1.0, 0.60, 0.55, 0.60, -1.5, -2.0, -2.5,
            ],
        )
        .with_numeric(
            "r",
            vec![
                12.6, 9.5, 7.3, 5.0, 3.6, 0.9, -1.9, 0.70, 0.45, 0.30, -2.5, -3.1, -3.5,
            ],
        )
        .with_labels("stage", stage.iter().map(|s| s.to_string()).collect())
}

pub const HB_SPAN: (f64, f64) = (0.810, 0.814);

pub fn chabrier() -> Arc<dyn MassFunction> {
    Arc::new(Chabrier2003::default())
}

pub fn fixture_track(config: IsochroneConfig) -> Track {
    Track::from_table(&fixture_table(), config, chabrier()).unwrap()
}

/// Configuration with horizontal-branch magnitude scatter enabled.
pub fn dispersed_config(dispersion: f64) -> IsochroneConfig {
    let mut config = IsochroneConfig::default();
    config.horizontal_branch.dispersion = dispersion;
    config
}

/// Selection whose colour-magnitude window never cuts the fixture track.
pub fn open_selection(limits: &[f64]) -> SparseSelection {
    let pixels = (0..limits.len() as u64).map(|p| 1000 + p).collect();
    let bounds = CmdBounds::new((-10.0, 40.0), (-5.0, 5.0)).unwrap();
    SparseSelection::new(pixels, limits.to_vec(), limits.to_vec(), bounds).unwrap()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
