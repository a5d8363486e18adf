//! `prmirror status` — what the mirror currently holds.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use prmirror_core::{FileStore, RecordStore, Snapshot, TrackedRecord};
use prmirror_sync::SyncContext;

/// Arguments for `prmirror status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = super::load_settings(config)?;
        let ctx = SyncContext::from_settings(&settings);
        let store = FileStore::in_data_dir(&ctx.data_dir);
        let snapshot = store
            .load()
            .with_context(|| format!("failed to read {}", store.path().display()))?;

        let report = build_report(&ctx, &snapshot);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    organization: String,
    cursor: u64,
    pull_requests: usize,
    repositories: BTreeMap<String, Vec<PullRequestRow>>,
}

#[derive(Debug, Serialize, Tabled)]
struct PullRequestRow {
    #[tabled(rename = "#")]
    number: u64,
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "updated")]
    updated_at: String,
}

fn build_report(ctx: &SyncContext, snapshot: &Snapshot) -> StatusReport {
    let cursor = snapshot
        .cursor(&ctx.cursor_key)
        .map(|c| c.last_processed_id.0)
        .unwrap_or(0);

    let mut repositories = BTreeMap::<String, Vec<PullRequestRow>>::new();
    for record in snapshot.records() {
        repositories
            .entry(record.repo_full_name.clone())
            .or_default()
            .push(row(record));
    }
    for rows in repositories.values_mut() {
        rows.sort_by_key(|r| r.number);
    }

    StatusReport {
        organization: ctx.organization.clone(),
        cursor,
        pull_requests: snapshot.len(),
        repositories,
    }
}

fn row(record: &TrackedRecord) -> PullRequestRow {
    PullRequestRow {
        number: record.number,
        id: record.id.0,
        title: record.title.clone(),
        updated_at: record.updated_at.clone(),
    }
}

fn print_table(report: StatusReport) {
    println!(
        "prmirror v{} | {} | {} repositories | {} open pull requests | cursor {}",
        env!("CARGO_PKG_VERSION"),
        report.organization,
        report.repositories.len(),
        report.pull_requests,
        report.cursor,
    );

    if report.repositories.is_empty() {
        println!("No pull requests mirrored. Run 'prmirror update --all' to populate.");
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    for (repository, rows) in report.repositories {
        println!("{} ({})", repository.bold(), rows.len().to_string().green());
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{separator}");
    }
}
