//! # Snapshot Store Interface
//!
//! The synchronous query surface the engine consumes:
//! - `list_snapshot_ids(prefix)` → raw identifiers, unordered
//! - `fetch_records(snapshot)` → raw documents of one logical snapshot
//!
//! Two implementations live in this crate: `MemorySnapshotStore` (tests,
//! fixtures) and `storage::RedbSnapshotStore` (local embedded store).

use crate::extractor::{Extraction, RawRecord, extract};
use crate::{PupdatesError, SnapshotId};
use std::collections::BTreeMap;

/// Read-only view of a snapshot store.
pub trait SnapshotStore {
    /// Identifiers starting with `prefix`, in no particular order.
    fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, PupdatesError>;

    /// Every raw record of one logical snapshot.
    fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, PupdatesError>;

    /// Fetch and extract one snapshot.
    fn load_snapshot(&self, snapshot: &SnapshotId) -> Result<Extraction, PupdatesError> {
        let records = self.fetch_records(snapshot)?;
        Ok(extract(snapshot, &records))
    }
}

/// In-memory store keyed by raw snapshot identifier.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<String, Vec<RawRecord>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one snapshot.
    pub fn insert(&mut self, snapshot: impl Into<String>, records: Vec<RawRecord>) {
        self.snapshots.insert(snapshot.into(), records);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, PupdatesError> {
        Ok(self
            .snapshots
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, PupdatesError> {
        self.snapshots
            .get(snapshot.as_str())
            .cloned()
            .ok_or_else(|| PupdatesError::PartialFetchFailure {
                snapshot: snapshot.to_string(),
                reason: "snapshot not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityId;
    use crate::primitives::DEFAULT_SNAPSHOT_PREFIX;
    use serde_json::json;

    #[test]
    fn memory_store_lists_by_prefix_and_loads() {
        let mut store = MemorySnapshotStore::new();
        store.insert(
            "animal-humane-20251230-1500",
            vec![RawRecord::new("p", json!({"id": 1, "name": "A"}))],
        );
        store.insert("other-20251230-1500", Vec::new());

        let ids = store.list_snapshot_ids(DEFAULT_SNAPSHOT_PREFIX).expect("list");
        assert_eq!(ids, vec!["animal-humane-20251230-1500".to_string()]);

        let id = SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, &ids[0]).expect("id");
        let extraction = store.load_snapshot(&id).expect("load");
        assert!(extraction.snapshot.contains(EntityId(1)));
    }

    #[test]
    fn missing_snapshot_is_a_fetch_failure() {
        let store = MemorySnapshotStore::new();
        let id =
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, "animal-humane-20251230-1500").expect("id");
        assert!(matches!(
            store.fetch_records(&id),
            Err(PupdatesError::PartialFetchFailure { .. })
        ));
    }
}
