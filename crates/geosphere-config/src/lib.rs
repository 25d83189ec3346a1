//! Configuration for the geosphere tools.
//!
//! Settings persist to disk as RON, with CLI overrides via clap and
//! hot-reload detection. Unknown fields are ignored and missing ones take
//! their defaults, so old and new config files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, DemoConfig, PlanetConfig, TerrainConfig};
pub use error::ConfigError;
