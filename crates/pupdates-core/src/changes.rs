//! # Field Change Detector
//!
//! Field-level changes of entities listed in both `previous` and `latest`.
//! Informational only: changes are not part of the five-list contract.

use crate::timeline::ExtractedSnapshot;
use crate::{EntityId, EntityRecord};
use serde::{Deserialize, Serialize};

/// Fields that are compared between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Name,
    Status,
    Location,
    LengthOfStayDays,
}

impl TrackedField {
    pub const ALL: [TrackedField; 4] = [
        TrackedField::Name,
        TrackedField::Status,
        TrackedField::Location,
        TrackedField::LengthOfStayDays,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Status => "status",
            Self::Location => "location",
            Self::LengthOfStayDays => "length_of_stay_days",
        }
    }

    fn value_of(self, record: &EntityRecord) -> String {
        match self {
            Self::Name => record.name.clone(),
            Self::Status => record.status.as_str().to_string(),
            Self::Location => record.location.clone(),
            Self::LengthOfStayDays => record
                .length_of_stay_days
                .map(|d| d.to_string())
                .unwrap_or_default(),
        }
    }
}

/// One changed field of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub entity_id: EntityId,
    /// Name as of `latest`.
    pub name: String,
    pub field: TrackedField,
    pub from: String,
    pub to: String,
}

/// Compare every entity present in both snapshots, in entity id order.
#[must_use]
pub fn detect_changes(previous: &ExtractedSnapshot, latest: &ExtractedSnapshot) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for now in latest.records() {
        let Some(before) = previous.get(now.entity_id) else {
            continue;
        };
        for field in TrackedField::ALL {
            let from = field.value_of(before);
            let to = field.value_of(now);
            if from != to {
                changes.push(FieldChange {
                    entity_id: now.entity_id,
                    name: now.name.clone(),
                    field,
                    from,
                    to,
                });
            }
        }
    }
    changes
}
