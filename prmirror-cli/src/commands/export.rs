//! `prmirror export` — publish the mirror without touching it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use prmirror_core::FileStore;
use prmirror_sync::{ExportOutcome, Exporter, SyncContext};

/// Arguments for `prmirror export`.
#[derive(Args, Debug)]
pub struct ExportArgs {}

impl ExportArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = super::load_settings(config)?;
        let ctx = SyncContext::from_settings(&settings);
        let store = FileStore::in_data_dir(&settings.data);

        let outcome = Exporter::new(&ctx).write(&store).context("export failed")?;
        if let ExportOutcome::Written { path } = outcome {
            println!("✓ exported to {}", path.display());
        }
        Ok(())
    }
}
