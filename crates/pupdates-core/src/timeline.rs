//! # History and Entity Timelines
//!
//! `History` is a pure fold over extracted snapshots. Whatever order the
//! snapshots arrive in, they are held newest first, so the classifier never
//! depends on fetch completion order.
//!
//! Timelines are built lazily: only entities that need historical context
//! ever get one.

use crate::{EntityId, EntityRecord, SnapshotId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

// =============================================================================
// EXTRACTED SNAPSHOT
// =============================================================================

/// One logical snapshot after extraction: at most one record per entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSnapshot {
    id: SnapshotId,
    entities: BTreeMap<EntityId, EntityRecord>,
}

impl ExtractedSnapshot {
    #[must_use]
    pub fn new(id: SnapshotId, entities: BTreeMap<EntityId, EntityRecord>) -> Self {
        Self { id, entities }
    }

    /// Build from records, keyed by their entity id. Later records replace earlier ones.
    #[must_use]
    pub fn from_records(id: SnapshotId, records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let entities = records.into_iter().map(|r| (r.entity_id, r)).collect();
        Self { id, entities }
    }

    #[must_use]
    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.id.date()
    }

    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&entity)
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Records in entity id order.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// =============================================================================
// HISTORY
// =============================================================================

/// Snapshots older than `previous`, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    snapshots: Vec<ExtractedSnapshot>,
}

impl History {
    /// Fold snapshots into history. Input order is irrelevant; a repeated
    /// snapshot id keeps only its first occurrence.
    #[must_use]
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = ExtractedSnapshot>) -> Self {
        let mut by_id: BTreeMap<SnapshotId, ExtractedSnapshot> = BTreeMap::new();
        for snapshot in snapshots {
            by_id.entry(snapshot.id.clone()).or_insert(snapshot);
        }
        Self {
            snapshots: by_id.into_values().rev().collect(),
        }
    }

    #[must_use]
    pub fn snapshots(&self) -> &[ExtractedSnapshot] {
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

    /// Snapshots whose calendar date lies in `[from, until)`, newest first.
    pub fn dated_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> impl Iterator<Item = &ExtractedSnapshot> {
        self.snapshots
            .iter()
            .filter(move |s| s.date() >= from && s.date() < until)
    }

    /// Build the timeline of one entity.
    #[must_use]
    pub fn timeline(&self, entity: EntityId) -> EntityTimeline<'_> {
        let entries = self
            .snapshots
            .iter()
            .filter_map(|s| s.get(entity).map(|r| (s.id(), r)))
            .collect();
        EntityTimeline { entries }
    }
}

/// Most recent record of every entity across `snapshots` dated on or after
/// `cutoff`. The first occurrence wins, so pass snapshots newest first.
#[must_use]
pub fn latest_records_since<'a>(
    snapshots: impl IntoIterator<Item = &'a ExtractedSnapshot>,
    cutoff: NaiveDate,
) -> BTreeMap<EntityId, (&'a SnapshotId, &'a EntityRecord)> {
    let mut out = BTreeMap::new();
    for snapshot in snapshots {
        if snapshot.date() < cutoff {
            continue;
        }
        for record in snapshot.records() {
            out.entry(record.entity_id)
                .or_insert((snapshot.id(), record));
        }
    }
    out
}

// =============================================================================
// ENTITY TIMELINE
// =============================================================================

/// The records of one entity, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTimeline<'a> {
    entries: Vec<(&'a SnapshotId, &'a EntityRecord)>,
}

impl<'a> EntityTimeline<'a> {
    #[must_use]
    pub fn entries(&self) -> &[(&'a SnapshotId, &'a EntityRecord)] {
        &self.entries
    }

    /// Newest record of the entity.
    #[must_use]
    pub fn most_recent(&self) -> Option<&'a EntityRecord> {
        self.entries.first().map(|(_, r)| *r)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose snapshot date lies in `[from, until)`.
    pub fn dated_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> impl Iterator<Item = &(&'a SnapshotId, &'a EntityRecord)> {
        self.entries
            .iter()
            .filter(move |(id, _)| id.date() >= from && id.date() < until)
    }
}

// =============================================================================
// TESTS
// =============================================================================
