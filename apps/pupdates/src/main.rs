//! # Pupdates - Shelter Listing Diff Runner
//!
//! The main binary for Pupdates.
//!
//! This application provides:
//! - CLI interface for batch diff runs
//! - Snapshot sources (Elasticsearch, local redb store)
//! - Report writing (JSON, text summary, CSV)
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                apps/pupdates (THE BINARY)              │
//! │                                                        │
//! │  ┌───────────┐    ┌──────────────┐    ┌────────────┐   │
//! │  │   CLI     │───▶│ Batch runner │───▶│  Reports   │   │
//! │  │  (clap)   │    │   (tokio)    │    │ (tempfile) │   │
//! │  └───────────┘    └──────┬───────┘    └────────────┘   │
//! │                          ▼                             │
//! │                  ┌───────────────┐                     │
//! │                  │ pupdates-core │                     │
//! │                  │  (THE LOGIC)  │                     │
//! │                  └───────────────┘                     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Compare the two newest snapshots and write reports
//! pupdates diff
//!
//! # Work from the local store instead of Elasticsearch
//! pupdates -S local import -f dump.json
//! pupdates -S local diff --dry-run
//! ```

use clap::Parser;
use pupdates::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — PUPDATES_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PUPDATES_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pupdates=info,pupdates_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
