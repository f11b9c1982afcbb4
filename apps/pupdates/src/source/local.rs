//! # Local Source
//!
//! Async adapter over the redb snapshot store. redb calls block, so every
//! call runs on tokio's blocking pool.

use super::{SnapshotSource, SourceError};
use pupdates_core::{RawRecord, RedbSnapshotStore, SnapshotId, SnapshotStore};
use std::path::Path;
use std::sync::Arc;

/// Snapshot source backed by a local `RedbSnapshotStore`.
#[derive(Debug, Clone)]
pub struct LocalSource {
    store: Arc<RedbSnapshotStore>,
}

impl LocalSource {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Ok(Self {
            store: Arc::new(RedbSnapshotStore::open(path)?),
        })
    }

    /// The underlying store, for writes.
    #[must_use]
    pub fn store(&self) -> &RedbSnapshotStore {
        &self.store
    }
}

impl SnapshotSource for LocalSource {
    async fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let store = Arc::clone(&self.store);
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || store.list_snapshot_ids(&prefix))
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))?
            .map_err(SourceError::from)
    }

    async fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, SourceError> {
        let store = Arc::clone(&self.store);
        let snapshot = snapshot.clone();
        tokio::task::spawn_blocking(move || store.fetch_records(&snapshot))
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))?
            .map_err(SourceError::from)
    }
}
