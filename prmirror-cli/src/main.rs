//! prmirror — mirror an organization's open pull requests.
//!
//! # Usage
//!
//! ```text
//! prmirror [--config <path>] [--verbose] update [--all]
//! prmirror [--config <path>] export
//! prmirror [--config <path>] status [--json]
//! prmirror [--config <path>] config
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, export::ExportArgs, status::StatusArgs, update::UpdateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "prmirror",
    version,
    about = "Keep a local mirror of an organization's open pull requests",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.prmirror/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring the mirror up to date, then export it.
    Update(UpdateArgs),

    /// Write the export document from the current mirror.
    Export(ExportArgs),

    /// Show mirrored pull requests and the event cursor.
    Status(StatusArgs),

    /// Print the effective configuration.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Update(args) => args.run(config),
        Commands::Export(args) => args.run(config),
        Commands::Status(args) => args.run(config),
        Commands::Config(args) => args.run(config),
    }
}

/// Logs go to stderr so `export` can own stdout.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
