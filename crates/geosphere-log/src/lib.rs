//! Structured logging for the geosphere crates.
//!
//! Console output goes through `tracing-subscriber`'s fmt layer with uptime
//! timestamps and thread names, so split jobs running on the
//! `geopatch-worker-N` threads are easy to tell apart from the frame loop.
//! Debug builds can also write a JSON log for post-mortem analysis.

use std::path::{Path, PathBuf};

use geosphere_config::Config;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info,geosphere_terrain=warn";

/// Name of the JSON log written in debug builds.
pub const LOG_FILE_NAME: &str = "geosphere.log";

/// Filter directives for the given config: its `log_level` if set, the
/// default otherwise.
pub fn filter_directives(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => {
            config.debug.log_level.trim().to_string()
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default directives.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the config's `log_level`. When `debug_build` is set
/// and `log_dir` can be created, a JSON file layer is added as well and its
/// path is returned.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Result<Option<PathBuf>, TryInitError> {
    let directives = filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && let Some((log_file, path)) = open_log_file(log_dir)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).try_init()?;
        return Ok(Some(path));
    }

    subscriber.try_init()?;
    Ok(None)
}

fn open_log_file(log_dir: &Path) -> Option<(std::fs::File, PathBuf)> {
    std::fs::create_dir_all(log_dir).ok()?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = std::fs::File::create(&path).ok()?;
    Some((file, path))
}
