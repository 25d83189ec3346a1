//! Command-line arguments for the geosphere demo.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "geosphere", about = "Fly a camera down to a procedurally generated planet")]
pub struct CliArgs {
    /// Terrain detail level (0-4).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub detail: Option<u8>,

    /// Planet radius in meters.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Number of frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Patch generation worker threads (0 = automatic).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(detail) = args.detail {
            self.terrain.detail = detail;
        }
        if let Some(radius) = args.radius {
            self.planet.radius_m = radius;
        }
        if let Some(seed) = args.seed {
            self.planet.seed = seed;
        }
        if let Some(frames) = args.frames {
            self.demo.frames = frames;
        }
        if let Some(workers) = args.workers {
            self.terrain.worker_threads = workers;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
