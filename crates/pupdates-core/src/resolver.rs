//! # Override & Exclusion Resolver
//!
//! Final pass over a classified diff:
//! - `enforce_exclusivity` keeps each entity in its highest-precedence list
//! - `apply_overrides` moves every overridden entity into Adopted
//!
//! Both are pure and idempotent. Overrides are applied after every other
//! rule, exclusions included, so an override always ends up in Adopted.

use crate::diff::{Category, ClassifiedDiff, EntitySummary, entity_url};
use crate::overrides::OverrideSet;
use crate::timeline::ExtractedSnapshot;
use crate::StatusTag;

/// Keep each entity only in its highest-precedence list.
#[must_use]
pub fn enforce_exclusivity(diff: ClassifiedDiff) -> ClassifiedDiff {
    ClassifiedDiff::from_placements(diff.into_placements())
}

/// Move every override into Adopted, removing it from any other list.
///
/// The summary is, in order of preference: the one already in the diff, one
/// built from the entity's record in `latest`, one built from the override
/// name.
#[must_use]
pub fn apply_overrides(
    diff: ClassifiedDiff,
    overrides: &OverrideSet,
    latest: &ExtractedSnapshot,
    url_base: &str,
) -> ClassifiedDiff {
    let mut placements = diff.into_placements();

    for entry in overrides.iter() {
        let summary = match placements.remove(&entry.entity_id) {
            Some((_, summary)) => summary,
            None => match latest.get(entry.entity_id) {
                Some(record) => EntitySummary::from_record(record, url_base),
                None => EntitySummary {
                    entity_id: entry.entity_id,
                    name: entry.name.clone(),
                    url: entity_url(url_base, entry.entity_id),
                    status: StatusTag::Adopted,
                    location: String::new(),
                },
            },
        };
        placements.insert(entry.entity_id, (Category::Adopted, summary));
    }

    ClassifiedDiff::from_placements(placements)
}
