//! Shared helpers for the Pawprint command-line tools

pub mod output;

use anyhow::Result;
use pawprint_core::PawprintConfig;
use std::path::Path;

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Initialize logging; quiet unless verbose so stdout stays clean JSON
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Load the given config, or `config.toml` if present, or filesystem defaults
pub fn load_config(path: Option<&str>) -> Result<PawprintConfig> {
    match path {
        Some(path) => PawprintConfig::load(Path::new(path)),
        None if Path::new(DEFAULT_CONFIG).exists() => PawprintConfig::load(Path::new(DEFAULT_CONFIG)),
        None => {
            log::info!("No {} found, using filesystem defaults", DEFAULT_CONFIG);
            Ok(PawprintConfig::default_filesystem())
        }
    }
}
