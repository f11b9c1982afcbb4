//! # Batch Runner
//!
//! One invocation, one logical batch:
//!
//! 1. List snapshot ids and build the catalog
//! 2. Fetch latest, previous and the history window concurrently
//!    (bounded by a semaphore, each fetch with timeout and retry)
//! 3. Sort results by snapshot recency, extract, fold into history
//! 4. Classify, detect field changes, build the run report
//!
//! History fetches race the fetch deadline. Whatever has not arrived when it
//! passes is aborted and reported as a `PartialFetchFailure`; the run goes on
//! with the history it has. Only latest and previous are required.
//!
//! Cancellation drops every in-flight fetch and yields `Cancelled`: a
//! cancelled run produces nothing.

use crate::config::FetchConfig;
use crate::source::{SnapshotSource, SourceError};
use chrono::{Days, NaiveDate, NaiveDateTime};
use pupdates_core::{
    Classifier, ClassifierInput, ExtractedSnapshot, History, OverrideSet, PupdatesError,
    RawRecord, RunContext, RunReport, SnapshotCatalog, SnapshotId, detect_changes, extract,
};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout, timeout_at};

/// Everything a run needs besides the source.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub snapshot_prefix: String,
    pub fetch: FetchConfig,
    pub classifier: Classifier,
    pub overrides: OverrideSet,
    /// Wall-clock time of the run, captured once by the caller.
    pub now: NaiveDateTime,
}

/// Run one batch. Resolves to `Cancelled` if `cancel` completes first.
pub async fn run_batch<S, C>(
    source: Arc<S>,
    settings: &BatchSettings,
    cancel: C,
) -> Result<RunReport, PupdatesError>
where
    S: SnapshotSource + 'static,
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = cancel => {
            tracing::warn!("Run cancelled, no report produced");
            Err(PupdatesError::Cancelled)
        }
        result = collect_and_classify(source, settings) => result,
    }
}

async fn collect_and_classify<S>(
    source: Arc<S>,
    settings: &BatchSettings,
) -> Result<RunReport, PupdatesError>
where
    S: SnapshotSource + 'static,
{
    let mut warnings: Vec<PupdatesError> = Vec::new();

    // Catalog
    let ids = with_retry(&settings.fetch, "list snapshots", || {
        source.list_snapshot_ids(&settings.snapshot_prefix)
    })
    .await
    .map_err(|e| PupdatesError::StoreUnavailable(e.to_string()))?;

    let (catalog, skipped) = SnapshotCatalog::from_ids(&settings.snapshot_prefix, ids);
    let skipped_ids = skipped.len();
    warnings.extend(skipped);
    let (latest_id, previous_id) = catalog.require_pair()?;
    let (latest_id, previous_id) = (latest_id.clone(), previous_id.clone());

    let cutoff = history_cutoff(&latest_id, settings);
    let history_ids: Vec<SnapshotId> = catalog.history_since(cutoff).into_iter().cloned().collect();
    tracing::info!(
        "Comparing {} against {} with {} historical snapshot(s) since {}",
        latest_id,
        previous_id,
        history_ids.len(),
        cutoff
    );

    // Fetch
    let required = vec![latest_id.clone(), previous_id.clone()];
    let Fetched {
        mut required,
        history: fetched,
        unfinished,
    } = fetch_all(source, required, history_ids, &settings.fetch).await?;

    let usable = required.values().filter(|result| result.is_ok()).count();
    let latest = take_required(&mut required, &latest_id, usable, &mut warnings)?;
    let previous = take_required(&mut required, &previous_id, usable, &mut warnings)?;

    // History: BTreeMap order, never completion order
    let mut history = Vec::with_capacity(fetched.len());
    let mut failed_history = unfinished.len();
    let deadline_reason =
        PupdatesError::DeadlineExceeded(settings.fetch.deadline().as_secs()).to_string();
    for id in unfinished {
        warnings.push(PupdatesError::PartialFetchFailure {
            snapshot: id.to_string(),
            reason: deadline_reason.clone(),
        });
    }
    for (id, result) in fetched {
        match result {
            Ok(records) => {
                let extraction = extract(&id, &records);
                warnings.extend(extraction.warnings);
                history.push(extraction.snapshot);
            }
            Err(e) => {
                failed_history += 1;
                warnings.push(PupdatesError::PartialFetchFailure {
                    snapshot: id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    let history = History::from_snapshots(history);

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    // Classify
    let diff = settings.classifier.classify(&ClassifierInput {
        latest: &latest,
        previous: &previous,
        history: &history,
        overrides: &settings.overrides,
        now: settings.now,
    });
    let changed = detect_changes(&previous, &latest);

    tracing::info!(
        "Classified: {} new, {} returned, {} adopted, {} trial, {} unlisted, {} field change(s)",
        diff.new.len(),
        diff.returned.len(),
        diff.adopted.len(),
        diff.trial.len(),
        diff.unlisted.len(),
        changed.len()
    );

    Ok(RunReport::new(
        RunContext {
            latest: &latest_id,
            previous: &previous_id,
            total_latest: latest.len(),
            total_previous: previous.len(),
            historical_snapshots: history.len(),
            skipped_snapshots: skipped_ids + failed_history,
            generated_at: settings.now,
        },
        diff,
        changed,
        warnings.iter().map(ToString::to_string).collect(),
    ))
}

/// Oldest calendar day any classifier rule can look at.
fn history_cutoff(latest: &SnapshotId, settings: &BatchSettings) -> NaiveDate {
    let config = settings.classifier.config();
    let returned = days_before(latest.date(), config.returned_lookback_days);
    let unlisted = days_before(settings.now.date(), config.unlisted_window_days);
    returned.min(unlisted)
}

fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Remove latest or previous from the fetch results; failure is fatal.
fn take_required(
    fetched: &mut FetchResults,
    id: &SnapshotId,
    usable: usize,
    warnings: &mut Vec<PupdatesError>,
) -> Result<ExtractedSnapshot, PupdatesError> {
    match fetched.remove(id) {
        Some(Ok(records)) => {
            let extraction = extract(id, &records);
            warnings.extend(extraction.warnings);
            Ok(extraction.snapshot)
        }
        Some(Err(e)) => {
            tracing::error!("Cannot fetch {}: {}", id, e);
            Err(PupdatesError::InsufficientHistory { available: usable })
        }
        None => Err(PupdatesError::InsufficientHistory { available: usable }),
    }
}

// =============================================================================
// CONCURRENT FETCH
// =============================================================================

type FetchResults = BTreeMap<SnapshotId, Result<Vec<RawRecord>, SourceError>>;

/// Outcome of the concurrent fetch.
struct Fetched {
    required: FetchResults,
    history: FetchResults,
    /// History snapshots still in flight when the deadline passed.
    unfinished: Vec<SnapshotId>,
}

/// Fetch every snapshot with at most `max_concurrent` requests in flight.
///
/// Per-snapshot failures are returned as data. Required snapshots are always
/// awaited; their fetches are bounded by timeout and retry alone. History
/// fetches still running at the deadline are aborted. Dropping the returned
/// future aborts every outstanding fetch.
async fn fetch_all<S>(
    source: Arc<S>,
    required: Vec<SnapshotId>,
    history: Vec<SnapshotId>,
    policy: &FetchConfig,
) -> Result<Fetched, PupdatesError>
where
    S: SnapshotSource + 'static,
{
    let deadline = Instant::now() + policy.deadline();
    let semaphore = Arc::new(Semaphore::new(policy.max_concurrent));

    // Required first: the semaphore hands out permits in FIFO order.
    let mut required_tasks = spawn_fetches(&source, &semaphore, required, policy);
    let mut pending: BTreeSet<SnapshotId> = history.iter().cloned().collect();
    let mut history_tasks = spawn_fetches(&source, &semaphore, history, policy);

    let mut required_results = BTreeMap::new();
    while let Some(joined) = required_tasks.join_next().await {
        let (id, result) = joined.map_err(|e| PupdatesError::IoError(e.to_string()))?;
        if let Err(ref e) = result {
            tracing::debug!("Fetch of {} failed: {}", id, e);
        }
        required_results.insert(id, result);
    }

    let mut history_results = BTreeMap::new();
    loop {
        match timeout_at(deadline, history_tasks.join_next()).await {
            Ok(Some(joined)) => {
                let (id, result) = joined.map_err(|e| PupdatesError::IoError(e.to_string()))?;
                if let Err(ref e) = result {
                    tracing::debug!("Fetch of {} failed: {}", id, e);
                }
                pending.remove(&id);
                history_results.insert(id, result);
            }
            Ok(None) => break,
            Err(_) => {
                history_tasks.abort_all();
                tracing::warn!(
                    "Fetch deadline passed with {} historical snapshot(s) outstanding",
                    pending.len()
                );
                break;
            }
        }
    }

    Ok(Fetched {
        required: required_results,
        history: history_results,
        unfinished: pending.into_iter().collect(),
    })
}

fn spawn_fetches<S>(
    source: &Arc<S>,
    semaphore: &Arc<Semaphore>,
    ids: Vec<SnapshotId>,
    policy: &FetchConfig,
) -> JoinSet<(SnapshotId, Result<Vec<RawRecord>, SourceError>)>
where
    S: SnapshotSource + 'static,
{
    let mut tasks = JoinSet::new();
    for id in ids {
        let source = Arc::clone(source);
        let semaphore = Arc::clone(semaphore);
        let policy = policy.clone();
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    let label = id.to_string();
                    with_retry(&policy, &label, || source.fetch_records(&id)).await
                }
                Err(_) => Err(SourceError::Worker("fetch semaphore closed".to_string())),
            };
            (id, result)
        });
    }
    tasks
}

/// Run `op` under the per-request timeout, retrying transient failures.
async fn with_retry<T, F, Fut>(
    policy: &FetchConfig,
    what: &str,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 1u32;
    loop {
        let result = match timeout(policy.timeout(), op()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(policy.timeout_secs)),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                let wait = policy.backoff(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}ms",
                    what,
                    attempt,
                    policy.attempts,
                    e,
                    wait.as_millis()
                );
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
