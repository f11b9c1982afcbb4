//! # redb-backed Snapshot Store
//!
//! A local, append-only snapshot store on the redb embedded database.
//!
//! Snapshots are immutable once written: appending an identifier that
//! already exists is rejected. Each record is stored in the `formats`
//! record encoding under `(snapshot_number, record_index)`, so one range
//! scan returns a snapshot in enumeration order.

use crate::extractor::RawRecord;
use crate::formats::{decode_record, encode_record};
use crate::primitives::MAX_RECORDS_PER_SNAPSHOT;
use crate::store::SnapshotStore;
use crate::{PupdatesError, SnapshotId};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for snapshots: identifier -> snapshot number
const SNAPSHOTS: TableDefinition<&str, u64> = TableDefinition::new("snapshots");

/// Table for records: (snapshot number, record index) -> encoded record
const RECORDS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_SNAPSHOT_KEY: &str = "next_snapshot";

fn io_err(e: impl std::fmt::Display) -> PupdatesError {
    PupdatesError::IoError(e.to_string())
}

/// A disk-backed snapshot store using redb.
pub struct RedbSnapshotStore {
    db: Database,
}

impl std::fmt::Debug for RedbSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbSnapshotStore").finish_non_exhaustive()
    }
}

impl RedbSnapshotStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PupdatesError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Append one snapshot in a single transaction. Returns the record count.
    ///
    /// # Errors
    ///
    /// - `IoError` if the identifier already exists or the write fails
    /// - `SerializationError` if a record cannot be encoded
    ///
    /// Every record is encoded before the transaction opens, so a bad
    /// record leaves the store untouched.
    pub fn append_snapshot(
        &self,
        snapshot: &SnapshotId,
        records: &[RawRecord],
    ) -> Result<usize, PupdatesError> {
        if records.len() > MAX_RECORDS_PER_SNAPSHOT {
            return Err(PupdatesError::SerializationError(format!(
                "Snapshot too large: {} records exceeds maximum of {}",
                records.len(),
                MAX_RECORDS_PER_SNAPSHOT
            )));
        }

        let encoded = records
            .iter()
            .map(encode_record)
            .collect::<Result<Vec<_>, _>>()?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut snapshots = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            let mut table = write_txn.open_table(RECORDS).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            if snapshots.get(snapshot.as_str()).map_err(io_err)?.is_some() {
                return Err(PupdatesError::IoError(format!(
                    "snapshot {snapshot} already exists"
                )));
            }

            let number = meta
                .get(NEXT_SNAPSHOT_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);

            for (index, bytes) in encoded.iter().enumerate() {
                table
                    .insert((number, index as u64), bytes.as_slice())
                    .map_err(io_err)?;
            }
            snapshots.insert(snapshot.as_str(), number).map_err(io_err)?;
            meta.insert(NEXT_SNAPSHOT_KEY, number.saturating_add(1))
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        Ok(encoded.len())
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> Result<usize, PupdatesError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;
        let mut count = 0usize;
        for entry in table.iter().map_err(io_err)? {
            entry.map_err(io_err)?;
            count += 1;
        }
        Ok(count)
    }
}

impl SnapshotStore for RedbSnapshotStore {
    fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, PupdatesError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| PupdatesError::StoreUnavailable(e.to_string()))?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            let id = key.value();
            if id.starts_with(prefix) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, PupdatesError> {
        let fetch_err = |reason: String| PupdatesError::PartialFetchFailure {
            snapshot: snapshot.to_string(),
            reason,
        };

        let read_txn = self.db.begin_read().map_err(|e| fetch_err(e.to_string()))?;
        let snapshots = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| fetch_err(e.to_string()))?;
        let number = snapshots
            .get(snapshot.as_str())
            .map_err(|e| fetch_err(e.to_string()))?
            .map(|v| v.value())
            .ok_or_else(|| fetch_err("snapshot not found".to_string()))?;

        let table = read_txn
            .open_table(RECORDS)
            .map_err(|e| fetch_err(e.to_string()))?;
        let mut records = Vec::new();
        for entry in table
            .range((number, 0u64)..=(number, u64::MAX))
            .map_err(|e| fetch_err(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| fetch_err(e.to_string()))?;
            records.push(decode_record(value.value())?);
        }
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::DEFAULT_SNAPSHOT_PREFIX;
    use crate::EntityId;
    use serde_json::json;
    use tempfile::tempdir;

    fn id(raw: &str) -> SnapshotId {
        SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, raw).expect("id")
    }

    #[test]
    fn append_then_fetch_preserves_enumeration_order() {
        let dir = tempdir().expect("tempdir");
        let store = RedbSnapshotStore::open(dir.path().join("snapshots.redb")).expect("open");

        let snap = id("animal-humane-20251230-1500");
        let records = vec![
            RawRecord::new(snap.as_str(), json!({"id": 2, "name": "B"})),
            RawRecord::new(snap.as_str(), json!({"id": 1, "name": "A"})),
        ];
        assert_eq!(store.append_snapshot(&snap, &records).expect("append"), 2);

        let fetched = store.fetch_records(&snap).expect("fetch");
        assert_eq!(fetched, records);

        let extraction = store.load_snapshot(&snap).expect("load");
        assert!(extraction.snapshot.contains(EntityId(1)));
        assert!(extraction.snapshot.contains(EntityId(2)));
    }

    #[test]
    fn snapshots_are_append_only() {
        let dir = tempdir().expect("tempdir");
        let store = RedbSnapshotStore::open(dir.path().join("snapshots.redb")).expect("open");
        let snap = id("animal-humane-20251230-1500");

        store.append_snapshot(&snap, &[]).expect("first append");
        assert!(store.append_snapshot(&snap, &[]).is_err());
        assert_eq!(store.snapshot_count().expect("count"), 1);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshots.redb");

        {
            let store = RedbSnapshotStore::open(&path).expect("open");
            store
                .append_snapshot(
                    &id("animal-humane-20251229-1500"),
                    &[RawRecord::new("p", json!({"id": 1}))],
                )
                .expect("append");
            store
                .append_snapshot(&id("animal-humane-20251230-1500"), &[])
                .expect("append");
        }

        let store = RedbSnapshotStore::open(&path).expect("reopen");
        let mut ids = store
            .list_snapshot_ids(DEFAULT_SNAPSHOT_PREFIX)
            .expect("list");
        ids.sort();
        assert_eq!(
            ids,
            vec![
                "animal-humane-20251229-1500".to_string(),
                "animal-humane-20251230-1500".to_string(),
            ]
        );
        assert_eq!(
            store
                .fetch_records(&id("animal-humane-20251229-1500"))
                .expect("fetch")
                .len(),
            1
        );
    }

    #[test]
    fn unknown_snapshot_is_a_fetch_failure() {
        let dir = tempdir().expect("tempdir");
        let store = RedbSnapshotStore::open(dir.path().join("snapshots.redb")).expect("open");
        assert!(matches!(
            store.fetch_records(&id("animal-humane-20251230-1500")),
            Err(PupdatesError::PartialFetchFailure { .. })
        ));
    }
}
