//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Cli;
use crate::config::{Config, SourceKind, load_overrides};
use crate::output::write_reports;
use crate::runner::{BatchSettings, run_batch};
use crate::source::{AnySource, LocalSource, SnapshotSource};
use pupdates_core::{
    Classifier, PupdatesError, RawRecord, SnapshotCatalog, SnapshotId, extract, render_summary,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (100 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), PupdatesError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PupdatesError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(PupdatesError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Configuration after file, environment and flags have been layered.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub quiet: bool,
    pub json_mode: bool,
}

impl Settings {
    /// File, then environment, then global flags. Validated once.
    pub fn resolve(cli: &Cli) -> Result<Self, PupdatesError> {
        let mut config = Config::load(cli.config.as_deref())?.with_env();

        if let Some(kind) = cli.source {
            config.source.kind = kind;
        }
        if let Some(endpoint) = &cli.endpoint {
            config.source.endpoint = endpoint.clone();
        }
        if let Some(store) = &cli.store {
            config.source.store_path = store.clone();
        }
        config.validate()?;

        Ok(Self {
            config,
            quiet: cli.quiet,
            json_mode: cli.json_mode,
        })
    }
}

/// Per-run flags of the `diff` command.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub lookback_days: Option<u32>,
    pub unlisted_days: Option<u32>,
    pub overrides: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub dry_run: bool,
}

// =============================================================================
// DIFF
// =============================================================================

/// Run one batch and write its reports.
pub async fn cmd_diff(settings: Settings, options: DiffOptions) -> Result<(), PupdatesError> {
    let mut config = settings.config;
    if let Some(days) = options.lookback_days {
        config.windows.returned_lookback_days = days;
    }
    if let Some(days) = options.unlisted_days {
        config.windows.unlisted_days = days;
    }
    if let Some(path) = options.overrides {
        config.source.overrides_path = path;
    }
    if let Some(dir) = options.out_dir {
        config.output.dir = dir;
    }
    config.validate()?;

    let overrides = load_overrides(&config.source.overrides_path)?;
    let classifier = Classifier::new(config.classifier_config())?;
    let now = chrono::Local::now().naive_local();

    let batch = BatchSettings {
        snapshot_prefix: config.source.snapshot_prefix.clone(),
        fetch: config.fetch.clone(),
        classifier,
        overrides,
        now,
    };

    let source = Arc::new(AnySource::from_config(&config.source)?);
    let report = run_batch(source, &batch, shutdown_signal()).await?;

    if options.dry_run {
        tracing::info!("Dry run, no report files written");
    } else {
        let written = write_reports(&report, &config.output, now)?;
        if !settings.quiet && !settings.json_mode {
            for path in &written {
                println!("Wrote {}", path.display());
            }
            println!();
        }
    }

    if settings.json_mode {
        println!("{}", report.to_json()?);
    } else if !settings.quiet {
        println!(
            "Pupdates: {} vs {}",
            report.comparison.latest, report.comparison.previous
        );
        println!();
        print!("{}", render_summary(&report.diff));
    }

    Ok(())
}

/// Completes on Ctrl+C. Never completes if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// List the snapshot catalog, newest first.
pub async fn cmd_snapshots(settings: &Settings) -> Result<(), PupdatesError> {
    let source = AnySource::from_config(&settings.config.source)?;
    let catalog = load_catalog(&source, &settings.config.source.snapshot_prefix).await?;

    if settings.json_mode {
        let ids: Vec<&str> = catalog.snapshots().iter().map(SnapshotId::as_str).collect();
        let json = serde_json::to_string_pretty(&ids)
            .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }
    if settings.quiet {
        return Ok(());
    }

    println!("Snapshots ({})", catalog.len());
    println!("=============");
    for (i, id) in catalog.snapshots().iter().enumerate() {
        let role = match i {
            0 => "  [latest]",
            1 => "  [previous]",
            _ => "",
        };
        println!("{}  {}{}", id, id.captured_at().format("%Y-%m-%d %H:%M"), role);
    }
    Ok(())
}

async fn load_catalog<S: SnapshotSource>(
    source: &S,
    prefix: &str,
) -> Result<SnapshotCatalog, PupdatesError> {
    let ids = source.list_snapshot_ids(prefix).await?;
    let (catalog, skipped) = SnapshotCatalog::from_ids(prefix, ids);
    for warning in &skipped {
        tracing::warn!("{}", warning);
    }
    Ok(catalog)
}

// =============================================================================
// IMPORT
// =============================================================================

/// Append a JSON array of documents to the local store as one snapshot.
///
/// Elements shaped like search hits (`{"_source": {...}}`) are unwrapped.
pub fn cmd_import(
    settings: &Settings,
    file: &Path,
    snapshot: Option<&str>,
) -> Result<(), PupdatesError> {
    if settings.config.source.kind != SourceKind::Local {
        tracing::info!(
            "Import always writes the local store at {}",
            settings.config.source.store_path.display()
        );
    }

    let prefix = &settings.config.source.snapshot_prefix;
    let id = match snapshot {
        Some(raw) => SnapshotId::parse(prefix, raw)?,
        None => SnapshotId::from_parts(prefix, chrono::Local::now().naive_local()),
    };

    validate_file_size(file, MAX_IMPORT_FILE_SIZE)?;
    let content = std::fs::read_to_string(file)
        .map_err(|e| PupdatesError::IoError(format!("Cannot read '{}': {}", file.display(), e)))?;
    let documents: Vec<Value> = serde_json::from_str(&content)
        .map_err(|e| PupdatesError::SerializationError(format!("Invalid JSON array: {}", e)))?;

    let records: Vec<RawRecord> = documents
        .into_iter()
        .map(|doc| match doc {
            Value::Object(mut map) if map.contains_key("_source") => {
                RawRecord::new(id.as_str(), map.remove("_source").unwrap_or_default())
            }
            other => RawRecord::new(id.as_str(), other),
        })
        .collect();

    let source = LocalSource::open(&settings.config.source.store_path)?;
    let count = source.store().append_snapshot(&id, &records)?;

    tracing::info!("Imported {} record(s) as {}", count, id);
    if !settings.quiet {
        println!("Imported {} record(s) as {}", count, id);
    }
    Ok(())
}

// =============================================================================
// SHOW
// =============================================================================

/// Print the extracted records of one snapshot.
pub async fn cmd_show(settings: &Settings, snapshot: Option<&str>) -> Result<(), PupdatesError> {
    let prefix = &settings.config.source.snapshot_prefix;
    let source = AnySource::from_config(&settings.config.source)?;

    let id = match snapshot {
        Some(raw) => SnapshotId::parse(prefix, raw)?,
        None => load_catalog(&source, prefix)
            .await?
            .latest()
            .cloned()
            .ok_or(PupdatesError::InsufficientHistory { available: 0 })?,
    };

    let records = source.fetch_records(&id).await?;
    let extraction = extract(&id, &records);
    for warning in &extraction.warnings {
        tracing::warn!("{}", warning);
    }
    let extracted = extraction.snapshot;

    if settings.json_mode {
        let records: Vec<_> = extracted.records().collect();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }
    if settings.quiet {
        return Ok(());
    }

    println!("Snapshot {} ({} entities)", id, extracted.len());
    println!();
    for record in extracted.records() {
        println!(
            "{:>10}  {:<20}  {:<10}  {}",
            record.entity_id,
            record.name,
            record.status.as_str(),
            record.location
        );
    }
    Ok(())
}
