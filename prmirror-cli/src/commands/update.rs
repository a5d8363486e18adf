//! `prmirror update` — run an engine, then export.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use prmirror_core::{FileStore, Settings};
use prmirror_sync::{
    pipeline, EngineReport, EventLog, ExportOutcome, GitHubFeed, MemoryEventLog, SqliteEventLog,
    SyncContext, UpdateMode, UpdateReport,
};

/// Arguments for `prmirror update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Rebuild the mirror from every open pull request instead of replaying events.
    #[arg(long)]
    pub all: bool,
}

impl UpdateArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = super::load_settings(config)?;
        let mode = if self.all {
            UpdateMode::Full
        } else {
            UpdateMode::Queue
        };

        let report = match settings.event_log.as_deref() {
            Some(path) => {
                let log = SqliteEventLog::open(path)
                    .with_context(|| format!("failed to open event log {}", path.display()))?;
                run_update(&settings, &log, mode)?
            }
            None if mode == UpdateMode::Full => {
                tracing::warn!("no event-log configured; the event cursor will not move");
                run_update(&settings, &MemoryEventLog::default(), mode)?
            }
            None => bail!("`event-log` must be configured to replay events; use --all for a full update"),
        };

        print_report(&report);
        if let Some(event) = report.halted_at() {
            bail!("stopped before event {event}: unknown pull request state");
        }
        Ok(())
    }
}

fn run_update<L: EventLog>(settings: &Settings, log: &L, mode: UpdateMode) -> Result<UpdateReport> {
    let ctx = SyncContext::from_settings(settings);
    let store = FileStore::in_data_dir(&settings.data);
    let feed = GitHubFeed::from_settings(settings);
    pipeline::update(&ctx, &store, &feed, log, mode).context("update failed")
}

/// Summary goes to stderr when the export itself went to stdout.
fn print_report(report: &UpdateReport) {
    let summary = match &report.engine {
        EngineReport::Full(r) => format!(
            "✓ full update: {} repositories, {} created, {} updated, {} deleted (cursor {})",
            r.repositories, r.created, r.updated, r.deleted, r.cursor
        ),
        EngineReport::Queue(r) => format!(
            "✓ queue update: {} events, {} created, {} updated, {} deleted, {} skipped (cursor {})",
            r.processed, r.created, r.updated, r.deleted, r.skipped, r.cursor
        ),
    };
    match &report.export {
        ExportOutcome::Written { path } => {
            println!("{summary}");
            println!("  ✎  {}", path.display());
        }
        ExportOutcome::Stdout => eprintln!("{summary}"),
    }
}
