//! # Entity Extractor
//!
//! Normalizes raw store documents into `EntityRecord`s and deduplicates
//! them per entity inside one logical snapshot.
//!
//! This is the ONLY place where document shape is interpreted:
//! - `id` and `dog_id` are accepted, as numbers or numeric strings
//! - `location` and `origin` may be a string, a list of strings, or null
//! - `status` is open text, parsed into the closed `StatusTag` set
//! - `intake_date` may be a date or a date-time string
//!
//! Documents without a usable id are dropped with an `InvalidDocument`
//! warning. Extraction itself never fails.

use crate::primitives::{MAX_RECORDS_PER_SNAPSHOT, SNAPSHOT_TIME_FORMAT};
use crate::timeline::ExtractedSnapshot;
use crate::{EntityId, EntityRecord, PupdatesError, SnapshotId, StatusTag};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// RAW INPUT
// =============================================================================

/// One document as returned by the snapshot store, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Physical partition the document came from (index or shard name).
    pub partition: String,
    /// Write timestamp reported by the store, when it has one.
    pub written_at: Option<NaiveDateTime>,
    /// The document body.
    pub document: serde_json::Value,
}

impl RawRecord {
    #[must_use]
    pub fn new(partition: impl Into<String>, document: serde_json::Value) -> Self {
        Self {
            partition: partition.into(),
            written_at: None,
            document,
        }
    }

    #[must_use]
    pub fn written_at(mut self, written_at: NaiveDateTime) -> Self {
        self.written_at = Some(written_at);
        self
    }
}

/// Shape of a stored entity document. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawEntityDocument {
    #[serde(default, alias = "dog_id")]
    id: Option<RawId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    location: Option<TextField>,
    #[serde(default)]
    origin: Option<TextField>,
    #[serde(default)]
    intake_date: Option<String>,
    #[serde(default)]
    length_of_stay_days: Option<RawCount>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TextField {
    One(String),
    Many(Vec<Option<String>>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Number(u32),
    Text(String),
}

impl TextField {
    /// List values are joined with a single space.
    fn normalize(self) -> String {
        match self {
            Self::One(s) => s.trim().to_string(),
            Self::Many(parts) => parts
                .into_iter()
                .flatten()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// A normalized snapshot plus the recoverable problems found on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub snapshot: ExtractedSnapshot,
    pub warnings: Vec<PupdatesError>,
}

/// Normalize a single document.
pub fn normalize_document(
    snapshot: &SnapshotId,
    document: &serde_json::Value,
) -> Result<EntityRecord, PupdatesError> {
    let invalid = |reason: String| PupdatesError::InvalidDocument {
        snapshot: snapshot.to_string(),
        reason,
    };

    let raw = RawEntityDocument::deserialize(document).map_err(|e| invalid(e.to_string()))?;

    let entity_id = match raw.id {
        Some(RawId::Number(n)) => EntityId(n),
        Some(RawId::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(EntityId)
            .map_err(|_| invalid(format!("non-numeric id {text:?}")))?,
        None => return Err(invalid("document has no id".to_string())),
    };

    Ok(EntityRecord {
        entity_id,
        name: raw.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        status: raw
            .status
            .as_deref()
            .map(StatusTag::parse)
            .unwrap_or_default(),
        location: raw.location.map(TextField::normalize).unwrap_or_default(),
        origin: raw.origin.map(TextField::normalize).unwrap_or_default(),
        intake_date: raw.intake_date.as_deref().and_then(parse_intake_date),
        length_of_stay_days: raw.length_of_stay_days.and_then(|c| match c {
            RawCount::Number(n) => Some(n),
            RawCount::Text(t) => t.trim().parse().ok(),
        }),
        url: raw
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
    })
}

/// Date or date-time text; only the calendar date is kept.
fn parse_intake_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Length of a rendered `SNAPSHOT_TIME_FORMAT` stamp.
const STAMP_LEN: usize = "20251230-1500".len();

/// Capture time encoded in a partition name that follows the snapshot
/// naming. A suffix after the stamp (a shard tag) is ignored.
fn partition_time(prefix: &str, partition: &str) -> Option<NaiveDateTime> {
    let stamp = partition.strip_prefix(prefix)?.get(..STAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIME_FORMAT).ok()
}

/// Dedup key: newer write wins, then the more recent partition, then
/// enumeration order. Partitions without a readable stamp rank oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WriteOrder {
    written_at: Option<NaiveDateTime>,
    partition_at: Option<NaiveDateTime>,
    index: usize,
}

impl WriteOrder {
    /// Two records are only ordered by enumeration.
    fn ties_with(&self, other: &Self) -> bool {
        self.written_at == other.written_at && self.partition_at == other.partition_at
    }
}

/// Normalize and deduplicate every record of one logical snapshot.
pub fn extract(snapshot: &SnapshotId, records: &[RawRecord]) -> Extraction {
    let mut warnings = Vec::new();
    let mut winners: BTreeMap<EntityId, (WriteOrder, EntityRecord)> = BTreeMap::new();
    let mut partitions: BTreeMap<&str, Option<NaiveDateTime>> = BTreeMap::new();

    if records.len() > MAX_RECORDS_PER_SNAPSHOT {
        warnings.push(PupdatesError::InvalidDocument {
            snapshot: snapshot.to_string(),
            reason: format!(
                "{} records exceed the limit of {}; the rest were dropped",
                records.len(),
                MAX_RECORDS_PER_SNAPSHOT
            ),
        });
    }

    for (index, raw) in records.iter().take(MAX_RECORDS_PER_SNAPSHOT).enumerate() {
        let record = match normalize_document(snapshot, &raw.document) {
            Ok(record) => record,
            Err(e) => {
                warnings.push(e);
                continue;
            }
        };

        let partition_at = *partitions
            .entry(raw.partition.as_str())
            .or_insert_with(|| partition_time(snapshot.prefix(), &raw.partition));
        let order = WriteOrder {
            written_at: raw.written_at,
            partition_at,
            index,
        };

        match winners.get_mut(&record.entity_id) {
            None => {
                winners.insert(record.entity_id, (order, record));
            }
            Some((held, kept)) => {
                if held.ties_with(&order) {
                    warnings.push(PupdatesError::NondeterministicDedup {
                        snapshot: snapshot.to_string(),
                        entity: record.entity_id,
                    });
                }
                if order.cmp(held) == Ordering::Greater {
                    *held = order;
                    *kept = record;
                }
            }
        }
    }

    let entities = winners
        .into_iter()
        .map(|(id, (_, record))| (id, record))
        .collect();

    Extraction {
        snapshot: ExtractedSnapshot::new(snapshot.clone(), entities),
        warnings,
    }
}

// =============================================================================
// TESTS
// =============================================================================
