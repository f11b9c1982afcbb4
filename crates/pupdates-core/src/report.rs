//! # Report Formats
//!
//! Pure renderers for one run. File I/O lives in the app layer.
//!
//! - `RunReport` → pretty JSON
//! - `ClassifiedDiff` → human summary with fixed section order
//! - `ClassifiedDiff` + changes → CSV change list

use crate::changes::FieldChange;
use crate::diff::{Category, ClassifiedDiff};
use crate::{PupdatesError, SnapshotId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// =============================================================================
// RUN REPORT
// =============================================================================

/// Which snapshots a run compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub latest: String,
    pub previous: String,
    /// History snapshots that were folded in.
    pub historical_snapshots: usize,
    /// Snapshots excluded from the catalog or skipped on fetch.
    pub skipped_snapshots: usize,
    pub generated_at: NaiveDateTime,
}

/// Per-category counts plus population sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub new: usize,
    pub returned: usize,
    pub adopted: usize,
    pub trial: usize,
    pub unlisted: usize,
    pub changed: usize,
    pub total_latest: usize,
    pub total_previous: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub comparison: Comparison,
    pub summary: Summary,
    #[serde(flatten)]
    pub diff: ClassifiedDiff,
    pub changed: Vec<FieldChange>,
    pub warnings: Vec<String>,
}

/// Inputs to `RunReport::new` besides the diff itself.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub latest: &'a SnapshotId,
    pub previous: &'a SnapshotId,
    pub total_latest: usize,
    pub total_previous: usize,
    pub historical_snapshots: usize,
    pub skipped_snapshots: usize,
    pub generated_at: NaiveDateTime,
}

impl RunReport {
    #[must_use]
    pub fn new(
        context: RunContext<'_>,
        diff: ClassifiedDiff,
        changed: Vec<FieldChange>,
        warnings: Vec<String>,
    ) -> Self {
        let summary = Summary {
            new: diff.new.len(),
            returned: diff.returned.len(),
            adopted: diff.adopted.len(),
            trial: diff.trial.len(),
            unlisted: diff.unlisted.len(),
            changed: changed.len(),
            total_latest: context.total_latest,
            total_previous: context.total_previous,
        };
        Self {
            comparison: Comparison {
                latest: context.latest.to_string(),
                previous: context.previous.to_string(),
                historical_snapshots: context.historical_snapshots,
                skipped_snapshots: context.skipped_snapshots,
                generated_at: context.generated_at,
            },
            summary,
            diff,
            changed,
            warnings,
        }
    }

    /// Pretty JSON. Field order is fixed, so equal reports give equal bytes.
    pub fn to_json(&self) -> Result<String, PupdatesError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PupdatesError::SerializationError(e.to_string()))
    }
}

// =============================================================================
// HUMAN SUMMARY
// =============================================================================

/// Fixed-order plain text summary. Every header is always present.
#[must_use]
pub fn render_summary(diff: &ClassifiedDiff) -> String {
    let mut out = String::new();
    for category in Category::ALL {
        out.push_str(category.heading());
        out.push('\n');
        for entity in diff.list(category) {
            out.push_str(&format!("{} - {}\n", entity.name, entity.url));
        }
        out.push('\n');
    }
    out
}

// =============================================================================
// CSV CHANGE LIST
// =============================================================================

const CSV_HEADER: [&str; 8] = [
    "Type",
    "Entity_ID",
    "Name",
    "Field",
    "Old_Value",
    "New_Value",
    "Status",
    "Location",
];

/// CSV with one row per classified entity, then one per changed field.
pub fn render_csv(diff: &ClassifiedDiff, changed: &[FieldChange]) -> Result<String, PupdatesError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| PupdatesError::SerializationError(e.to_string());

    writer.write_record(CSV_HEADER).map_err(csv_err)?;

    for category in Category::ALL {
        for entity in diff.list(category) {
            let id = entity.entity_id.to_string();
            writer
                .write_record([
                    category.row_type(),
                    id.as_str(),
                    entity.name.as_str(),
                    "",
                    "",
                    "",
                    entity.status.as_str(),
                    entity.location.as_str(),
                ])
                .map_err(csv_err)?;
        }
    }

    for change in changed {
        let id = change.entity_id.to_string();
        writer
            .write_record([
                "CHANGED",
                id.as_str(),
                change.name.as_str(),
                change.field.as_str(),
                change.from.as_str(),
                change.to.as_str(),
                "",
                "",
            ])
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PupdatesError::SerializationError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::TrackedField;
    use crate::diff::EntitySummary;
    use crate::primitives::DEFAULT_SNAPSHOT_PREFIX;
    use crate::{EntityId, StatusTag};
    use chrono::NaiveDate;

    fn summary(n: u64, name: &str, location: &str) -> EntitySummary {
        EntitySummary {
            entity_id: EntityId(n),
            name: name.to_string(),
            url: format!("https://new.shelterluv.com/embed/animal/{n}"),
            status: StatusTag::Available,
            location: location.to_string(),
        }
    }

    fn sample_diff() -> ClassifiedDiff {
        ClassifiedDiff {
            new: vec![summary(3, "Biscuit", "Kennel 3")],
            adopted: vec![summary(1, "Pepper", "")],
            ..ClassifiedDiff::default()
        }
    }

    #[test]
    fn summary_always_emits_every_header_in_order() {
        let text = render_summary(&ClassifiedDiff::default());
        assert_eq!(
            text,
            "New:\n\nReturned:\n\nAdopted/Reclaimed:\n\nTrial Adoptions:\n\n\
             Available but Temporarily Unlisted:\n\n"
        );
    }

    #[test]
    fn summary_lists_name_and_url() {
        let text = render_summary(&sample_diff());
        assert!(text.starts_with("New:\nBiscuit - https://new.shelterluv.com/embed/animal/3\n\n"));
        assert!(text.contains("Adopted/Reclaimed:\nPepper - https://new.shelterluv.com/embed/animal/1\n\n"));
    }

    #[test]
    fn csv_has_header_entity_rows_and_changes() {
        let changed = vec![FieldChange {
            entity_id: EntityId(4),
            name: "Luna".to_string(),
            field: TrackedField::Location,
            from: "Kennel 4".to_string(),
            to: "Kennel 9, upstairs".to_string(),
        }];

        let text = render_csv(&sample_diff(), &changed).expect("csv");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Type,Entity_ID,Name,Field,Old_Value,New_Value,Status,Location",
                "NEW,3,Biscuit,,,,available,Kennel 3",
                "ADOPTED,1,Pepper,,,,available,",
                "CHANGED,4,Luna,location,Kennel 4,\"Kennel 9, upstairs\",,",
            ]
        );
    }

    #[test]
    fn report_json_flattens_lists_and_counts() {
        let latest =
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, "animal-humane-20251230-1500").expect("id");
        let previous =
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, "animal-humane-20251230-0900").expect("id");
        let generated_at = NaiveDate::from_ymd_opt(2025, 12, 30)
            .and_then(|d| d.and_hms_opt(15, 5, 0))
            .expect("time");

        let report = RunReport::new(
            RunContext {
                latest: &latest,
                previous: &previous,
                total_latest: 10,
                total_previous: 11,
                historical_snapshots: 4,
                skipped_snapshots: 0,
                generated_at,
            },
            sample_diff(),
            Vec::new(),
            Vec::new(),
        );

        let value: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse");
        assert_eq!(value["summary"]["new"], 1);
        assert_eq!(value["summary"]["adopted"], 1);
        assert_eq!(value["comparison"]["latest"], "animal-humane-20251230-1500");
        assert_eq!(value["new"][0]["entity_id"], 3);
        assert_eq!(value["trial"], serde_json::json!([]));

        let again = report.to_json().expect("json");
        assert_eq!(report.to_json().expect("json"), again);
    }
}
