//! # Classified Diff
//!
//! The five disjoint result lists of one run.

use crate::{EntityId, EntityRecord, StatusTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CATEGORY
// =============================================================================

/// Lifecycle category an entity is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    New,
    Returned,
    Adopted,
    Trial,
    Unlisted,
}

impl Category {
    /// Fixed report order.
    pub const ALL: [Category; 5] = [
        Category::New,
        Category::Returned,
        Category::Adopted,
        Category::Trial,
        Category::Unlisted,
    ];

    /// Higher wins when one entity qualifies for several categories.
    ///
    /// Adopted > Trial > Returned > Unlisted > New. Overrides sit above all
    /// of these and are applied by the resolver.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Adopted => 4,
            Self::Trial => 3,
            Self::Returned => 2,
            Self::Unlisted => 1,
            Self::New => 0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Returned => "returned",
            Self::Adopted => "adopted",
            Self::Trial => "trial",
            Self::Unlisted => "unlisted",
        }
    }

    /// Section header in the human summary.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::New => "New:",
            Self::Returned => "Returned:",
            Self::Adopted => "Adopted/Reclaimed:",
            Self::Trial => "Trial Adoptions:",
            Self::Unlisted => "Available but Temporarily Unlisted:",
        }
    }

    /// Row type in the CSV change list.
    #[must_use]
    pub const fn row_type(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Returned => "RETURNED",
            Self::Adopted => "ADOPTED",
            Self::Trial => "TRIAL_ADOPTION",
            Self::Unlisted => "UNLISTED",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENTITY SUMMARY
// =============================================================================

/// What the output carries per classified entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: EntityId,
    pub name: String,
    pub url: String,
    pub status: StatusTag,
    pub location: String,
}

impl EntitySummary {
    /// Summarize a record. The record's own url wins over `url_base + id`.
    #[must_use]
    pub fn from_record(record: &EntityRecord, url_base: &str) -> Self {
        Self {
            entity_id: record.entity_id,
            name: record.name.clone(),
            url: record
                .url
                .clone()
                .unwrap_or_else(|| entity_url(url_base, record.entity_id)),
            status: record.status,
            location: record.location.clone(),
        }
    }
}

/// Public listing url of an entity.
#[must_use]
pub fn entity_url(url_base: &str, entity: EntityId) -> String {
    format!("{url_base}{entity}")
}

// =============================================================================
// CLASSIFIED DIFF
// =============================================================================

/// Five disjoint lists, each sorted by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedDiff {
    pub new: Vec<EntitySummary>,
    pub returned: Vec<EntitySummary>,
    pub adopted: Vec<EntitySummary>,
    pub trial: Vec<EntitySummary>,
    pub unlisted: Vec<EntitySummary>,
}

impl ClassifiedDiff {
    /// Build from one placement per entity.
    #[must_use]
    pub fn from_placements(placements: BTreeMap<EntityId, (Category, EntitySummary)>) -> Self {
        let mut diff = Self::default();
        // BTreeMap iteration keeps every list sorted by id.
        for (_, (category, summary)) in placements {
            diff.list_mut(category).push(summary);
        }
        diff
    }

    /// One placement per entity; on conflict the higher-precedence list wins.
    #[must_use]
    pub fn into_placements(self) -> BTreeMap<EntityId, (Category, EntitySummary)> {
        let mut placements: BTreeMap<EntityId, (Category, EntitySummary)> = BTreeMap::new();
        let Self {
            new,
            returned,
            adopted,
            trial,
            unlisted,
        } = self;
        let lists = [
            (Category::New, new),
            (Category::Returned, returned),
            (Category::Adopted, adopted),
            (Category::Trial, trial),
            (Category::Unlisted, unlisted),
        ];
        for (category, list) in lists {
            for summary in list {
                match placements.get(&summary.entity_id) {
                    Some((held, _)) if held.precedence() >= category.precedence() => {}
                    _ => {
                        placements.insert(summary.entity_id, (category, summary));
                    }
                }
            }
        }
        placements
    }

    #[must_use]
    pub fn list(&self, category: Category) -> &[EntitySummary] {
        match category {
            Category::New => &self.new,
            Category::Returned => &self.returned,
            Category::Adopted => &self.adopted,
            Category::Trial => &self.trial,
            Category::Unlisted => &self.unlisted,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<EntitySummary> {
        match category {
            Category::New => &mut self.new,
            Category::Returned => &mut self.returned,
            Category::Adopted => &mut self.adopted,
            Category::Trial => &mut self.trial,
            Category::Unlisted => &mut self.unlisted,
        }
    }

    /// Append without any exclusivity check; see `enforce_exclusivity`.
    pub(crate) fn push(&mut self, category: Category, summary: EntitySummary) {
        self.list_mut(category).push(summary);
    }

    /// Keep only the summaries `keep` accepts.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(Category, &EntitySummary) -> bool) {
        for category in Category::ALL {
            self.list_mut(category).retain(|summary| keep(category, summary));
        }
    }

    /// Category of `entity`, if it was reported at all.
    #[must_use]
    pub fn category_of(&self, entity: EntityId) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.list(*c).iter().any(|s| s.entity_id == entity))
    }

    /// Entity ids of one list, in list order.
    #[must_use]
    pub fn ids(&self, category: Category) -> Vec<EntityId> {
        self.list(category).iter().map(|s| s.entity_id).collect()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.list(*c).len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(n: u64) -> EntitySummary {
        EntitySummary {
            entity_id: EntityId(n),
            name: format!("dog-{n}"),
            url: entity_url("https://example.test/", EntityId(n)),
            status: StatusTag::Available,
            location: "Kennel".to_string(),
        }
    }

    #[test]
    fn precedence_orders_adopted_above_everything() {
        let mut ranked = Category::ALL;
        ranked.sort_by_key(|c| std::cmp::Reverse(c.precedence()));
        assert_eq!(
            ranked,
            [
                Category::Adopted,
                Category::Trial,
                Category::Returned,
                Category::Unlisted,
                Category::New,
            ]
        );
    }

    #[test]
    fn into_placements_keeps_highest_precedence() {
        let diff = ClassifiedDiff {
            new: vec![summary(1), summary(2)],
            trial: vec![summary(1)],
            adopted: vec![summary(2)],
            ..ClassifiedDiff::default()
        };

        let rebuilt = ClassifiedDiff::from_placements(diff.into_placements());
        assert_eq!(rebuilt.ids(Category::Trial), vec![EntityId(1)]);
        assert_eq!(rebuilt.ids(Category::Adopted), vec![EntityId(2)]);
        assert!(rebuilt.new.is_empty());
        assert_eq!(rebuilt.total(), 2);
    }

    #[test]
    fn record_url_wins_over_base() {
        let mut record = EntityRecord::new(EntityId(5), "Rex", StatusTag::Available, "K");
        assert_eq!(
            EntitySummary::from_record(&record, "https://example.test/").url,
            "https://example.test/5"
        );
        record.url = Some("https://listing.test/rex".to_string());
        assert_eq!(
            EntitySummary::from_record(&record, "https://example.test/").url,
            "https://listing.test/rex"
        );
    }

    #[test]
    fn category_of_finds_the_list() {
        let diff = ClassifiedDiff {
            unlisted: vec![summary(8)],
            ..ClassifiedDiff::default()
        };
        assert_eq!(diff.category_of(EntityId(8)), Some(Category::Unlisted));
        assert_eq!(diff.category_of(EntityId(9)), None);
    }
}
