//! Recsync CLI
//!
//! Command-line tools for exercising the sync engine offline.
//!
//! # Commands
//!
//! - `simulate` - Run a sync against in-memory collaborators loaded from a scenario file
//! - `diff` - Show which remote records a client would download
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Recsync command-line tools.
#[derive(Parser)]
#[command(name = "recsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync over in-memory collaborators described by a scenario file
    Simulate {
        /// Scenario file (JSON)
        scenario: PathBuf,

        /// Request cancellation before the run starts
        #[arg(long)]
        cancel_before_run: bool,

        /// Retry recoverable failures up to this many extra times
        #[arg(short, long, default_value = "0")]
        retries: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the ids a client would download given local and remote indexes
    Diff {
        /// Local `[{"_id", "_rev"}]` index (JSON)
        local: PathBuf,

        /// Remote `[{"_id", "_rev"}]` index (JSON)
        remote: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            scenario,
            cancel_before_run,
            retries,
            format,
        } => {
            commands::simulate::run(&scenario, cancel_before_run, retries, format)?;
        }
        Commands::Diff {
            local,
            remote,
            format,
        } => {
            commands::diff::run(&local, &remote, format)?;
        }
        Commands::Version => {
            println!("recsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
