//! # Snapshot Catalog
//!
//! Orders the snapshot identifiers a store reports by the capture time
//! embedded in each identifier.
//!
//! Identifiers that do not parse are excluded and handed back to the caller
//! as recoverable `MalformedIdentifier` errors; they never fail the run.

use crate::{PupdatesError, SnapshotId};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Snapshot identifiers ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotCatalog {
    /// Newest first. No duplicates.
    snapshots: Vec<SnapshotId>,
}

impl SnapshotCatalog {
    /// Build a catalog from raw identifiers.
    ///
    /// Returns the catalog and the identifiers that were skipped.
    pub fn from_ids<I, S>(prefix: &str, ids: I) -> (Self, Vec<PupdatesError>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = BTreeSet::new();
        let mut skipped = Vec::new();

        for raw in ids {
            match SnapshotId::parse(prefix, raw.as_ref()) {
                Ok(id) => {
                    parsed.insert(id);
                }
                Err(e) => skipped.push(e),
            }
        }

        let snapshots = parsed.into_iter().rev().collect();
        (Self { snapshots }, skipped)
    }

    /// All snapshots, newest first.
    #[must_use]
    pub fn snapshots(&self) -> &[SnapshotId] {
        &self.snapshots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&SnapshotId> {
        self.snapshots.first()
    }

    #[must_use]
    pub fn previous(&self) -> Option<&SnapshotId> {
        self.snapshots.get(1)
    }

    /// Latest and previous, or `InsufficientHistory`.
    pub fn require_pair(&self) -> Result<(&SnapshotId, &SnapshotId), PupdatesError> {
        match (self.latest(), self.previous()) {
            (Some(latest), Some(previous)) => Ok((latest, previous)),
            _ => Err(PupdatesError::InsufficientHistory {
                available: self.snapshots.len(),
            }),
        }
    }

    /// Snapshots captured on or after `cutoff`, newest first.
    #[must_use]
    pub fn window_since(&self, cutoff: NaiveDate) -> Vec<&SnapshotId> {
        self.snapshots
            .iter()
            .take_while(|id| id.date() >= cutoff)
            .collect()
    }

    /// History snapshots (older than `previous`) captured on or after `cutoff`.
    #[must_use]
    pub fn history_since(&self, cutoff: NaiveDate) -> Vec<&SnapshotId> {
        // The window is a prefix of the newest-first list.
        self.window_since(cutoff).into_iter().skip(2).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
