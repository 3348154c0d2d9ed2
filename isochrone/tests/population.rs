//! Resampling, statistics and observability of single tracks

mod common;

use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use common::{
    chabrier, dispersed_config, fixture_table, fixture_track, init_logging, open_selection,
    HB_SPAN,
};
use isochrone::horizontal_branch::dispersion_offsets;
use isochrone::imf::{MassFunction, PowerLaw};
use isochrone::{IsochroneConfig, IsochroneError, MaskGrid, Track, TrackData};
use ndarray::array;
use pop_math::gaussian_kernel;

#[test]
fn test_fixture_structure() {
    let track = fixture_track(IsochroneConfig::default());
    assert_eq!(track.len(), 13);
    assert_eq!(track.tail_index(), 11);
    assert_eq!(track.stage()[8], "BHeb");
    assert_eq!(track.stage()[12], "LTP");
    assert_eq!(track.mass_init_upper_bound(), 0.820);
}

#[test]
fn test_sample_sequences_have_equal_length() {
    init_logging();
    for config in [IsochroneConfig::default(), dispersed_config(0.1)] {
        let track = fixture_track(config);
        for steps in [1, 2, 7, 100, 1000] {
            for include_tail in [false, true] {
                let pop = track.sample(steps, 0.1, include_tail).unwrap();
                let n = pop.len();
                assert!(n >= steps);
                assert_eq!(pop.mass_init.len(), n);
                assert_eq!(pop.mass_act.len(), n);
                assert_eq!(pop.mag_1.len(), n);
                assert_eq!(pop.mag_2.len(), n);
                assert!(pop.weight.iter().all(|&w| w >= 0.0));
            }
        }
    }
}

#[test]
fn test_power_law_track_weights_sum_to_one() {
    // pdf(m) = 2 m^-2 on [0.1, 2.0]; the geometric-mean bin centre makes each
    // bin weight the exact integral over the bin
    let imf: Arc<dyn MassFunction> =
        Arc::new(PowerLaw::with_coefficient(2.0, -2.0, 0.1, 2.0).unwrap());
    assert_relative_eq!(imf.integrate(0.1, 2.0).unwrap(), 19.0, epsilon = 1e-12);

    let mass_init = vec![0.1, 0.2, 0.4, 0.7, 1.0, 1.4, 2.0];
    let n = mass_init.len();
    let data = TrackData {
        log_age: 9.0,
        metallicity: 0.001,
        mass_act: mass_init.clone(),
        mass_init,
        luminosity: vec![1.0; n],
        mag_1: (0..n).map(|i| 10.0 - i as f64).collect(),
        mag_2: (0..n).map(|i| 9.5 - i as f64).collect(),
        stage: vec![String::new(); n],
    };
    let track = Track::new(data, IsochroneConfig::default(), imf).unwrap();

    for steps in [6, 37, 500] {
        let pop = track.sample(steps, 0.1, true).unwrap();
        assert_relative_eq!(pop.total_weight(), 1.0, epsilon = 1e-9);
    }

    // A higher normalization bound leaves more than unit weight in the grid
    let pop = track.sample(500, 0.2, true).unwrap();
    assert_relative_eq!(pop.total_weight(), 19.0 / 9.0, epsilon = 1e-9);
}

#[test]
fn test_tail_excluded_weights_below_one() {
    let track = fixture_track(IsochroneConfig::default());
    let imf = chabrier();

    let pre_tail = track.sample(1000, 0.1, false).unwrap();
    let expected = imf.integrate(0.1, 0.816).unwrap() / imf.integrate(0.1, 0.820).unwrap();
    assert!(pre_tail.total_weight() < 1.0);
    assert_relative_eq!(pre_tail.total_weight(), expected, max_relative = 1e-3);

    let full = track.sample(1000, 0.1, true).unwrap();
    assert_relative_eq!(full.total_weight(), 1.0, max_relative = 1e-3);
}

#[test]
fn test_horizontal_branch_broadening() {
    let base = fixture_track(IsochroneConfig::default())
        .sample(1000, 0.1, false)
        .unwrap();
    let dispersed = fixture_track(dispersed_config(0.1))
        .sample(1000, 0.1, false)
        .unwrap();

    let offsets = dispersion_offsets(0.1, 0.025);
    assert_eq!(offsets.len(), 9);

    let hb_bins: Vec<usize> = base
        .mass_init
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m > HB_SPAN.0 && m < HB_SPAN.1)
        .map(|(i, _)| i)
        .collect();
    assert!(hb_bins.len() > 100);
    assert_eq!(dispersed.len(), base.len() + 8 * hb_bins.len());

    // Total weight is conserved
    assert_relative_eq!(
        dispersed.total_weight(),
        base.total_weight(),
        max_relative = 1e-12
    );

    // The leading block is the zero-offset copy
    for i in 0..base.len() {
        assert_eq!(dispersed.mag_1[i], base.mag_1[i]);
        assert_eq!(dispersed.mag_2[i], base.mag_2[i]);
        assert_eq!(dispersed.mass_init[i], base.mass_init[i]);
    }

    // All copies of one branch bin add back up to its undispersed weight
    let bin = hb_bins[hb_bins.len() / 2];
    let copies: f64 = dispersed
        .mass_init
        .iter()
        .zip(&dispersed.weight)
        .filter(|&(&m, _)| m == base.mass_init[bin])
        .map(|(_, w)| w)
        .sum();
    assert_relative_eq!(copies, base.weight[bin], max_relative = 1e-12);

    // Copies are shifted by the offsets
    let shifted: Vec<f64> = dispersed
        .mass_init
        .iter()
        .zip(&dispersed.mag_1)
        .filter(|&(&m, _)| m == base.mass_init[bin])
        .map(|(_, &mag)| mag - base.mag_1[bin])
        .collect();
    assert_eq!(shifted.len(), 9);
    assert_abs_diff_eq!(shifted[0], 0.0);
    for (k, &offset) in offsets.iter().filter(|&&o| o != 0.0).enumerate() {
        assert_abs_diff_eq!(shifted[k + 1], offset, epsilon = 1e-12);
    }
}

#[test]
fn test_negligible_dispersion_is_ignored() {
    let base = fixture_track(IsochroneConfig::default())
        .sample(300, 0.1, false)
        .unwrap();
    let tiny = fixture_track(dispersed_config(1e-3))
        .sample(300, 0.1, false)
        .unwrap();
    assert_eq!(base, tiny);
}

#[test]
fn test_stellar_statistics() {
    let track = fixture_track(IsochroneConfig::default());
    let mass = track.stellar_mass(0.1, 10000).unwrap();
    // Mean mass per star lies inside the tabulated range of present-day mass
    assert!(mass > 0.1 && mass < 0.8, "mean mass {mass}");

    // Extending below the tabulated minimum counts more (light) stars, but the
    // Chabrier support starts at 0.1 so nothing changes here
    assert_relative_eq!(
        track.stellar_mass(0.05, 10000).unwrap(),
        mass,
        max_relative = 1e-2
    );

    let luminosity = track.stellar_luminosity(10000).unwrap();
    assert!(luminosity > 0.0);
    assert!(matches!(
        track.stellar_luminosity(1),
        Err(IsochroneError::Domain(_))
    ));
}

#[test]
fn test_observable_fraction_decreases_with_distance() {
    let track = fixture_track(IsochroneConfig::default());
    let selection = open_selection(&[20.0, 22.0, 24.0, 26.0]);
    let total = track.sample(1000, 0.1, false).unwrap().total_weight();

    let mut previous: Option<Vec<f64>> = None;
    for step in 0..=20 {
        let distance_modulus = 10.0 + 0.5 * step as f64;
        let fraction = track
            .observable_fraction(&selection, distance_modulus, 0.1)
            .unwrap();
        assert_eq!(fraction.len(), 4);
        for (p, &f) in fraction.iter().enumerate() {
            assert!(f >= 0.0);
            assert!(f <= total * (1.0 + 1e-12));
            if let Some(prev) = &previous {
                assert!(f <= prev[p], "pixel {p} grew at m-M={distance_modulus}");
            }
        }
        // Deeper pixels never see fewer stars
        for w in fraction.windows(2) {
            assert!(w[0] <= w[1]);
        }
        previous = Some(fraction);
    }
}

#[test]
fn test_observable_fraction_respects_cmd_window() {
    let track = fixture_track(IsochroneConfig::default());
    let narrow = isochrone::SparseSelection::new(
        vec![1, 2],
        vec![40.0, 40.0],
        vec![40.0, 40.0],
        isochrone::CmdBounds::new((20.0, 30.0), (0.0, 2.0)).unwrap(),
    )
    .unwrap();
    let open = open_selection(&[40.0, 40.0]);

    let narrow_fraction = track.observable_fraction(&narrow, 18.0, 0.1).unwrap();
    let open_fraction = track.observable_fraction(&open, 18.0, 0.1).unwrap();
    assert!(narrow_fraction[0] < open_fraction[0]);
    assert!(narrow_fraction[0] > 0.0);
}

#[test]
fn test_normalize_with_mask_below_sampled_range() {
    let track = fixture_track(IsochroneConfig::default());
    let grid = MaskGrid::uniform(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0], 99.0, 99.0)
        .unwrap();

    let result = track.normalize_with_mask(&grid, 18.0, 200, 0.05, None).unwrap();
    assert_eq!(result.map.dim(), (2, 3));
    assert!(result.smoothed.is_none());

    let pop = track.sample(200, 0.1, false).unwrap();
    let first = pop.mass_init.iter().cloned().fold(f64::INFINITY, f64::min);
    let last = pop.mass_init.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let imf = track.imf();
    let factor = imf.integrate(first, last).unwrap() / imf.integrate(0.05, last).unwrap();
    assert!(factor < 1.0);
    for &value in result.map.iter() {
        assert_relative_eq!(value, factor * pop.total_weight(), max_relative = 1e-12);
    }
}

#[test]
fn test_normalize_with_mask_truncates_above_mass_min() {
    let track = fixture_track(IsochroneConfig::default());
    let grid = MaskGrid::new(
        vec![0.0, 1.0, 2.0],
        vec![0.0, 1.0],
        array![[99.0, 10.0]],
        array![[99.0, 99.0]],
    )
    .unwrap();

    let result = track
        .normalize_with_mask(&grid, 18.0, 200, 0.5, Some(array![[1.0]].view()))
        .unwrap();

    let pop = track.sample(200, 0.1, false).unwrap();
    let expected: f64 = pop
        .mass_init
        .iter()
        .zip(&pop.weight)
        .filter(|&(&m, _)| m > 0.5)
        .map(|(_, w)| w)
        .sum();
    assert_relative_eq!(result.map[[0, 0]], expected, max_relative = 1e-12);
    // Band 1 depth of 10 is brighter than every star at m-M = 18
    assert_eq!(result.map[[0, 1]], 0.0);

    // A unit kernel leaves the map unchanged
    assert_eq!(result.smoothed.unwrap(), result.map);
}

#[test]
fn test_normalize_with_mask_smoothing_preserves_interior_total() {
    let track = fixture_track(IsochroneConfig::default());
    let mut depth = ndarray::Array2::from_elem((7, 7), 10.0);
    depth[[3, 3]] = 99.0;
    let grid = MaskGrid::new(
        (0..8).map(f64::from).collect(),
        (0..8).map(f64::from).collect(),
        depth.clone(),
        depth,
    )
    .unwrap();
    let kernel = gaussian_kernel(3, 1.0);

    let result = track
        .normalize_with_mask(&grid, 18.0, 200, 0.1, Some(kernel.view()))
        .unwrap();
    let smoothed = result.smoothed.unwrap();
    assert_eq!(smoothed.dim(), (7, 7));
    assert_relative_eq!(smoothed.sum(), result.map.sum(), max_relative = 1e-12);
    assert!(smoothed[[3, 3]] < result.map[[3, 3]]);
    assert!(smoothed[[2, 3]] > 0.0);
    assert_eq!(smoothed[[0, 0]], 0.0);
}

#[test]
fn test_horizontal_branch_density() {
    let track = fixture_track(IsochroneConfig::default());
    let imf = chabrier();
    let expected = imf.integrate(0.810, 0.814).unwrap() / (2.0 * 0.5 * 0.4);

    let inside = track.horizontal_branch_density(0.1, 0.55).unwrap();
    assert_relative_eq!(inside, expected, max_relative = 1e-9);
    assert_eq!(track.horizontal_branch_density(0.1, 1.2).unwrap(), 0.0);
    assert_eq!(track.horizontal_branch_density(0.5, 0.55).unwrap(), 0.0);

    let values = track
        .horizontal_branch_densities(&[-0.05, 0.2, 0.1], &[0.6, 0.0, 0.9])
        .unwrap();
    assert_relative_eq!(values[0], expected, max_relative = 1e-9);
    assert_eq!(values[1], 0.0);
    assert_relative_eq!(values[2], expected, max_relative = 1e-9);
}

#[test]
fn test_non_monotonic_branch_fails_envelope() {
    let mut table = fixture_table();
    let mut r = table.numeric("r").unwrap().to_vec();
    // Colour of row 9 falls back below row 8
    r[9] = 0.58;
    table = table.with_numeric("r", r);
    let track = Track::from_table(&table, IsochroneConfig::default(), chabrier()).unwrap();

    assert!(matches!(
        track.horizontal_branch_density(0.1, 0.55),
        Err(IsochroneError::Envelope(_))
    ));
    // Sampling does not depend on the envelope
    assert!(track.sample(100, 0.1, false).is_ok());
}

#[test]
fn test_track_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Track>();

    let track = Arc::new(fixture_track(IsochroneConfig::default()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let track = Arc::clone(&track);
            std::thread::spawn(move || track.horizontal_branch_density(0.1, 0.55).unwrap())
        })
        .collect();
    let densities: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(densities.windows(2).all(|w| w[0] == w[1]));
}
