//! # Core Type Definitions
//!
//! This module contains the core types shared by every stage of the engine:
//! - Identifiers (`EntityId`, `SnapshotId`)
//! - The normalized entity model (`EntityRecord`, `StatusTag`)
//! - Error types (`PupdatesError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Carry no wall clock state; capture times come from identifiers

use crate::primitives::SNAPSHOT_TIME_FORMAT;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identifier of a tracked entity (one shelter animal).
///
/// This is the ONLY identity key. Names and locations repeat and collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one logical snapshot, with the capture time embedded in it.
///
/// Identifiers look like `animal-humane-20251230-1500`. Ordering is by
/// capture time first and raw text second, which is a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    raw: String,
    captured_at: NaiveDateTime,
}

impl SnapshotId {
    /// Parse an identifier carrying `prefix` followed by `YYYYMMDD-HHMM`.
    ///
    /// Anything after the time component (e.g. a shard suffix) is rejected:
    /// a logical snapshot has exactly one identifier.
    pub fn parse(prefix: &str, raw: &str) -> Result<Self, PupdatesError> {
        let stamp = raw
            .strip_prefix(prefix)
            .ok_or_else(|| PupdatesError::MalformedIdentifier(raw.to_string()))?;
        let captured_at = NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIME_FORMAT)
            .map_err(|_| PupdatesError::MalformedIdentifier(raw.to_string()))?;
        Ok(Self {
            raw: raw.to_string(),
            captured_at,
        })
    }

    /// Build an identifier from its parts. The time is truncated to the
    /// minute so the result equals what `parse` returns for the same text.
    #[must_use]
    pub fn from_parts(prefix: &str, captured_at: NaiveDateTime) -> Self {
        let captured_at = captured_at
            .date()
            .and_hms_opt(captured_at.hour(), captured_at.minute(), 0)
            .unwrap_or(captured_at);
        Self {
            raw: format!("{}{}", prefix, captured_at.format(SNAPSHOT_TIME_FORMAT)),
            captured_at,
        }
    }

    /// The identifier as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Text before the time component.
    #[must_use]
    pub fn prefix(&self) -> &str {
        let stamp = self.captured_at.format(SNAPSHOT_TIME_FORMAT).to_string();
        self.raw.strip_suffix(stamp.as_str()).unwrap_or_default()
    }

    /// Capture time parsed from the identifier.
    #[must_use]
    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    /// Calendar day of the capture ("business day" of the snapshot).
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.captured_at.date()
    }
}

impl Ord for SnapshotId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.captured_at
            .cmp(&other.captured_at)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Closed set of listing statuses.
///
/// The store carries status as free text ("Available", "adopted", ...).
/// The trial signal is NOT a status: it lives in the location text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusTag {
    Available,
    Adopted,
    Reclaimed,
    Euthanized,
    #[default]
    Unknown,
}

impl StatusTag {
    /// Parse free-text status, case-insensitively. Unrecognized text is `Unknown`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "available" => Self::Available,
            "adopted" => Self::Adopted,
            "reclaimed" => Self::Reclaimed,
            "euthanized" => Self::Euthanized,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Adopted => "adopted",
            Self::Reclaimed => "reclaimed",
            Self::Euthanized => "euthanized",
            Self::Unknown => "unknown",
        }
    }

    /// Adopted or reclaimed: the entity has left the shelter's care.
    #[must_use]
    pub const fn is_adopted_like(self) -> bool {
        matches!(self, Self::Adopted | Self::Reclaimed)
    }

    /// Still presumed in the shelter's care.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Available | Self::Unknown)
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENTITY RECORD
// =============================================================================

/// One entity's attributes as captured in one snapshot, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: EntityId,
    pub name: String,
    pub status: StatusTag,
    /// Empty location is the "removed" signal.
    pub location: String,
    pub origin: String,
    pub intake_date: Option<NaiveDate>,
    pub length_of_stay_days: Option<u32>,
    pub url: Option<String>,
}

impl EntityRecord {
    /// Minimal record with the given identity, status and location.
    #[must_use]
    pub fn new(
        entity_id: EntityId,
        name: impl Into<String>,
        status: StatusTag,
        location: impl Into<String>,
    ) -> Self {
        Self {
            entity_id,
            name: name.into(),
            status,
            location: location.into(),
            origin: String::new(),
            intake_date: None,
            length_of_stay_days: None,
            url: None,
        }
    }

    /// Builder-style origin setter.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub fn has_empty_location(&self) -> bool {
        self.location.trim().is_empty()
    }

    /// Location is non-empty and contains `marker`, case-insensitively.
    #[must_use]
    pub fn has_location_marker(&self, marker: &str) -> bool {
        !self.has_empty_location()
            && self
                .location
                .to_lowercase()
                .contains(&marker.to_lowercase())
    }

    /// Adopted/reclaimed status OR empty location.
    #[must_use]
    pub fn is_adopted_equivalent(&self) -> bool {
        self.status.is_adopted_like() || self.has_empty_location()
    }

    #[must_use]
    pub fn has_origin(&self, origin: &str) -> bool {
        self.origin.trim().eq_ignore_ascii_case(origin)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Pupdates engine.
///
/// - Recoverable errors are absorbed by the run and reported as warnings
/// - Fatal errors abort the run; no partial classification is produced
/// - The CORE never panics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PupdatesError {
    /// The snapshot store cannot be reached at all.
    #[error("Snapshot store unavailable: {0}")]
    StoreUnavailable(String),

    /// Fewer than two snapshots exist, or latest/previous cannot be read.
    #[error("Insufficient history: {available} usable snapshot(s), at least 2 required")]
    InsufficientHistory { available: usize },

    /// A snapshot identifier does not match the expected pattern.
    #[error("Malformed snapshot identifier: {0}")]
    MalformedIdentifier(String),

    /// A historical snapshot could not be fetched and was skipped.
    #[error("Partial fetch failure for {snapshot}: {reason}")]
    PartialFetchFailure { snapshot: String, reason: String },

    /// A stored document could not be normalized and was dropped.
    #[error("Invalid document in {snapshot}: {reason}")]
    InvalidDocument { snapshot: String, reason: String },

    /// Duplicates were resolved by enumeration order, not write recency.
    #[error("Entity {entity} in {snapshot} deduplicated without a write-recency signal")]
    NondeterministicDedup { snapshot: String, entity: EntityId },

    /// The override source exists but cannot be parsed.
    #[error("Invalid override source: {0}")]
    InvalidOverrides(String),

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The run was cancelled by its caller.
    #[error("Run cancelled")]
    Cancelled,

    /// A fetch did not finish before the fetch deadline.
    #[error("Fetch deadline of {0}s passed before the snapshot arrived")]
    DeadlineExceeded(u64),
}

impl PupdatesError {
    /// Recoverable errors degrade a run; everything else fails it.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedIdentifier(_)
                | Self::PartialFetchFailure { .. }
                | Self::InvalidDocument { .. }
                | Self::NondeterministicDedup { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
