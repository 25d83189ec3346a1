//! Headless fly-down over a procedurally generated planet.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p geosphere-demo -- --detail 3 --frames 900`.
//! Editing `terrain.detail` in `config.ron` while the demo runs rebuilds the planet.

mod flight;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use geosphere_config::{CliArgs, Config, ConfigError};
use geosphere_lod::BodyType;
use geosphere_mesh::DetailLevel;
use geosphere_planet::{DrawStats, GeoSphere, SphereBody, SphereSettings};
use geosphere_terrain::{AsyncJobQueue, FractalParams, FractalTerrain, JobError, JobQueue};
use tracing::{info, warn};

use crate::flight::FlightPath;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start patch workers: {0}")]
    Workers(#[from] JobError),
    #[error("failed to install logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

fn main() -> Result<(), DemoError> {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone() {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };

    let mut disk_config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = disk_config.clone();
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    let log_file = geosphere_log::init_logging(
        Some(&log_dir),
        cfg!(debug_assertions) && config.debug.log_to_file,
        Some(&config),
    )?;
    if let Some(path) = log_file {
        info!("Writing JSON log to {}", path.display());
    }

    let queue = start_workers(&config)?;
    let mut sphere = build_sphere(&config, queue);
    fly(&mut sphere, &config, &config_dir, &mut disk_config);
    Ok(())
}

fn start_workers(config: &Config) -> Result<Arc<dyn JobQueue>, JobError> {
    let capacity = config.terrain.max_split_requests.max(1) * 2;
    let queue = if config.terrain.worker_threads == 0 {
        AsyncJobQueue::with_defaults()?
    } else {
        AsyncJobQueue::new(config.terrain.worker_threads, capacity)?
    };
    info!("Started {} patch workers", queue.thread_count());
    Ok(Arc::new(queue))
}

fn settings_from(config: &Config) -> SphereSettings {
    SphereSettings {
        detail: DetailLevel::new(config.terrain.detail),
        max_split_requests: config.terrain.max_split_requests,
        sort_by_distance: config.terrain.sort_patches_by_distance,
        horizon_culling: config.terrain.horizon_culling,
    }
}

fn build_sphere(config: &Config, queue: Arc<dyn JobQueue>) -> GeoSphere {
    let planet = &config.planet;
    let terrain = FractalTerrain::new(FractalParams {
        seed: planet.seed,
        octaves: planet.octaves,
        amplitude_m: planet.amplitude_m,
        radius_m: planet.radius_m,
        ..Default::default()
    });
    let body = SphereBody::new("Demo", planet.radius_m, BodyType::Rocky);
    let sphere = GeoSphere::new(body, Arc::new(terrain), queue, settings_from(config));
    info!(
        radius_m = planet.radius_m,
        seed = planet.seed,
        detail = config.terrain.detail,
        max_depth = sphere.max_depth(),
        edge_len = sphere.context().edge_len(),
        "Planet ready"
    );
    sphere
}

fn fly(sphere: &mut GeoSphere, config: &Config, config_dir: &Path, disk_config: &mut Config) {
    let radius_m = config.planet.radius_m;
    let path = FlightPath::new(
        config.planet.start_altitude_m / radius_m,
        config.demo.descent_rate,
    );
    let interval = Duration::from_millis(config.demo.frame_interval_ms);
    let stats_every = config.demo.stats_every.max(1);
    let started = Instant::now();
    let mut draws = DrawStats::new();

    for frame in 0..config.demo.frames {
        let view = path.view(frame);
        sphere.update(&view);

        draws.reset();
        sphere.render(&view, &mut draws);

        if frame % stats_every == 0 {
            let stats = sphere.stats();
            info!(
                frame,
                altitude_km = path.altitude(frame) * radius_m / 1000.0,
                nodes = stats.nodes,
                leaves = stats.leaves,
                deepest = stats.deepest,
                in_flight = stats.in_flight,
                deferred = stats.deferred,
                drawn = draws.patches,
                triangles = draws.triangles,
                "LOD frame"
            );
            check_reload(sphere, config_dir, disk_config);
        }

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    let stats = sphere.stats();
    info!(
        frames = config.demo.frames,
        elapsed_s = started.elapsed().as_secs_f64(),
        nodes = stats.nodes,
        deepest = stats.deepest,
        max_depth = stats.max_depth,
        "Flight finished"
    );
}

/// Pick up `terrain.detail` edits made to `config.ron` while running.
fn check_reload(sphere: &mut GeoSphere, config_dir: &Path, disk_config: &mut Config) {
    match disk_config.reload(config_dir) {
        Ok(Some(new_config)) => {
            let detail = DetailLevel::new(new_config.terrain.detail);
            if detail != sphere.settings().detail {
                info!(detail = detail.level(), "Detail changed, rebuilding planet");
                sphere.set_detail(detail);
            }
            *disk_config = new_config;
        }
        Ok(None) => {}
        Err(e) => warn!("Config reload failed: {e}"),
    }
}

