//! # Overrides
//!
//! Manually maintained list of entities known to be adopted. An override
//! outranks every derived signal.
//!
//! Source format is a JSON array:
//! `[{"entity_id": 42, "name": "Biscuit"}, ...]` (`dog_id` is accepted too).
//! File I/O lives in the app; this module only parses.

use crate::{EntityId, PupdatesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One forced adoption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    #[serde(alias = "dog_id")]
    pub entity_id: EntityId,
    #[serde(default)]
    pub name: String,
}

/// Overrides keyed by entity id. A repeated id keeps its last entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    entries: BTreeMap<EntityId, Override>,
}

impl OverrideSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON source. Anything but a well-formed array is `InvalidOverrides`.
    pub fn from_json(text: &str) -> Result<Self, PupdatesError> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let entries: Vec<Override> =
            serde_json::from_str(text).map_err(|e| PupdatesError::InvalidOverrides(e.to_string()))?;
        Ok(entries.into_iter().collect())
    }

    pub fn insert(&mut self, entry: Override) {
        self.entries.insert(entry.entity_id, entry);
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entries.contains_key(&entity)
    }

    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&Override> {
        self.entries.get(&entity)
    }

    /// Entries in entity id order.
    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Override> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = Override>>(iter: I) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}
