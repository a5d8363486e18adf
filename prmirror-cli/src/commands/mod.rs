pub mod config;
pub mod export;
pub mod status;
pub mod update;

use std::path::Path;

use anyhow::{Context, Result};
use prmirror_core::{config as settings, Settings};

/// Settings from `--config`, or from the default location.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => settings::default_config_path().context("could not locate a config file")?,
    };
    settings::load_at(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}
