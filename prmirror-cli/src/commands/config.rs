//! `prmirror config` — show the effective settings.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for `prmirror config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

impl ConfigArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = super::load_settings(config)?;
        let yaml =
            serde_yaml::to_string(&settings.safe()).context("failed to serialize settings")?;
        print!("{yaml}");
        Ok(())
    }
}
