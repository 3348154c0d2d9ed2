//! Summarize an isochrone track and optionally simulate a population from it.
//!
//! Reads a parsed track table (JSON) and an optional configuration file,
//! then prints the track metadata, the mean stellar mass and luminosity per
//! star, and the size of the resampled population.
//!
//! Usage:
//! ```
//! cargo run --bin isochrone_summary -- --table track.json --simulate-mass 1e4 --distance-modulus 18
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use isochrone::{CompositeTrack, IsochroneConfig, Track, TrackTable};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Command line arguments for the track summary
#[derive(Parser, Debug)]
#[command(author, version, about = "Summarize an isochrone track")]
struct Args {
    /// Track table in JSON (log_age, metallicity and named columns)
    #[arg(long)]
    table: PathBuf,

    /// Configuration file in JSON (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include the thermal-pulse tail when resampling
    #[arg(long, default_value_t = false)]
    include_tail: bool,

    /// Colour at which to evaluate the horizontal-branch density
    #[arg(long, requires = "hb_mag")]
    hb_color: Option<f64>,

    /// Magnitude at which to evaluate the horizontal-branch density
    #[arg(long, requires = "hb_color")]
    hb_mag: Option<f64>,

    /// Total stellar mass (Msun) of a population to simulate
    #[arg(long)]
    simulate_mass: Option<f64>,

    /// Distance modulus applied to simulated magnitudes
    #[arg(long, default_value_t = 0.0)]
    distance_modulus: f64,

    /// Random number generator seed for the simulation
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn load_table(path: &Path) -> Result<TrackTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read track table {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse track table {}", path.display()))
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => IsochroneConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => IsochroneConfig::default(),
    };
    debug!("Configuration: {config:?}");

    let imf = config.imf.build()?;
    let table = load_table(&args.table)?;
    let track = Track::from_table(&table, config.clone(), imf)?;
    let sampling = &config.sampling;

    let meta = track.metadata();
    println!("Isochrone Summary");
    println!("=================");
    println!("log(age/yr):      {:.3}", meta.log_age);
    println!("Age:              {:.3} Gyr", meta.age / 1e9);
    println!("Z:                {:.5}", meta.metallicity);
    println!("[Fe/H]:           {:.3}", meta.feh);
    println!("Tabulated points: {}", track.len());
    println!("Tail index:       {}", track.tail_index());
    println!(
        "Initial mass:     {:.4} - {:.4} Msun",
        track.mass_init()[0],
        track.mass_init_upper_bound()
    );

    let (act_lo, act_hi) = min_max(track.mass_act());
    let (lum_lo, lum_hi) = min_max(track.luminosity());
    println!("Present mass:     {act_lo:.4} - {act_hi:.4} Msun");
    println!("Luminosity range: {lum_lo:.4e} - {lum_hi:.4e} Lsun");

    let stellar_mass = track.stellar_mass(sampling.mass_min, sampling.integration_steps)?;
    let stellar_luminosity = track.stellar_luminosity(sampling.integration_steps)?;
    println!("Stellar mass:     {stellar_mass:.4} Msun per star");
    println!("Luminosity:       {stellar_luminosity:.4} Lsun per star");

    let population = track.sample(sampling.mass_steps, sampling.mass_min, args.include_tail)?;
    println!(
        "Sample:           {} entries, total weight {:.6}",
        population.len(),
        population.total_weight()
    );

    if let (Some(color), Some(mag)) = (args.hb_color, args.hb_mag) {
        let envelope = track.horizontal_branch_envelope()?;
        println!("HB envelope:      {:.6} stars per mag^2", envelope.density());
        let density = track.horizontal_branch_density(color, mag)?;
        println!("HB density at ({color:.3}, {mag:.3}): {density:.6} per mag^2");
    }

    if let Some(total_mass) = args.simulate_mass {
        let composite = CompositeTrack::new(vec![1.0], vec![track])?;
        let mut rng = StdRng::seed_from_u64(args.seed);
        let stars = composite.simulate(total_mass, args.distance_modulus, &mut rng)?;
        println!(
            "Simulated:        {} stars for {:.1} Msun at m-M = {:.2}",
            stars.len(),
            total_mass,
            args.distance_modulus
        );
        if !stars.is_empty() {
            let (lo_1, hi_1) = min_max(&stars.mag_1);
            let (lo_2, hi_2) = min_max(&stars.mag_2);
            println!("  mag_1 range:    {lo_1:.3} - {hi_1:.3}");
            println!("  mag_2 range:    {lo_2:.3} - {hi_2:.3}");
        }
    }

    Ok(())
}
