//! # Pupdates CLI Module
//!
//! This module implements the CLI interface for Pupdates.
//!
//! ## Available Commands
//!
//! - `diff` - Compare the two newest snapshots and write reports
//! - `snapshots` - List the snapshot catalog
//! - `import` - Append a JSON dump to the local store as a snapshot
//! - `show` - Print one extracted snapshot

mod commands;

use crate::config::SourceKind;
use clap::{Parser, Subcommand};
use pupdates_core::PupdatesError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Pupdates - shelter listing diff runner
///
/// Compares periodic snapshots of a shelter's listed animals and reports
/// which are new, returned, adopted, on trial, or temporarily unlisted.
#[derive(Parser, Debug)]
#[command(name = "pupdates")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress human-readable output on stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./pupdates.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot source, overriding the configuration
    #[arg(short = 'S', long, global = true, value_enum)]
    pub source: Option<SourceKind>,

    /// Elasticsearch endpoint, overriding configuration and PUPDATES_ES_URL
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Local store path, overriding configuration and PUPDATES_STORE
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the newest snapshot against the previous one and write reports
    Diff {
        /// Days of history searched for a prior adoption
        #[arg(short, long)]
        lookback_days: Option<u32>,

        /// Days covered by the unlisted reconciliation
        #[arg(long)]
        unlisted_days: Option<u32>,

        /// Override file (JSON array of {entity_id, name})
        #[arg(short, long)]
        overrides: Option<PathBuf>,

        /// Report directory
        #[arg(short = 'O', long)]
        out_dir: Option<PathBuf>,

        /// Classify and print, but write no report files
        #[arg(long)]
        dry_run: bool,
    },

    /// List known snapshots, newest first
    Snapshots,

    /// Append a JSON array of documents to the local store as one snapshot
    Import {
        /// Input file path
        #[arg(short, long)]
        file: PathBuf,

        /// Snapshot identifier (default: prefix + current local time)
        #[arg(short = 'i', long)]
        snapshot: Option<String>,
    },

    /// Print the extracted records of one snapshot (default: latest)
    Show {
        /// Snapshot identifier
        #[arg(short = 'i', long)]
        snapshot: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), PupdatesError> {
    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Diff {
            lookback_days,
            unlisted_days,
            overrides,
            out_dir,
            dry_run,
        } => {
            let options = DiffOptions {
                lookback_days,
                unlisted_days,
                overrides,
                out_dir,
                dry_run,
            };
            cmd_diff(settings, options).await
        }
        Commands::Snapshots => cmd_snapshots(&settings).await,
        Commands::Import { file, snapshot } => cmd_import(&settings, &file, snapshot.as_deref()),
        Commands::Show { snapshot } => cmd_show(&settings, snapshot.as_deref()).await,
    }
}
