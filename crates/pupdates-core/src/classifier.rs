//! # Lifecycle Classifier
//!
//! Produces the five-category diff between `latest` and `previous`, using
//! older snapshots as context.
//!
//! ## Rules
//!
//! 1. Disappeared (in previous, not in latest), first match wins:
//!    adopted/reclaimed status or empty location → Adopted;
//!    trial marker in location → Trial; otherwise → Unlisted.
//! 2. Appeared (in latest, not in previous): see `detector`.
//! 3. Currently listed: trial marker → Trial. Adopted-equivalent now but not
//!    in its most recent prior record → Adopted (trial supersession).
//! 4. Rolling window: most recent record of every entity absent from latest
//!    with a non-empty, non-trial location and an active status → Unlisted.
//! 5. Exclusions: most recent status euthanized → dropped everywhere;
//!    stray origin → dropped from Returned.
//!
//! Every step only proposes placements. `enforce_exclusivity` then keeps
//! each entity in its highest-precedence list, exclusions drop what they
//! name, and overrides are applied last and always win.
//!
//! The classifier is a pure function of its input. `now` is an explicit
//! field of `ClassifierInput`; the system clock is never read here.

use crate::diff::{Category, ClassifiedDiff, EntitySummary};
use crate::detector::{Appearance, detect_appearance};
use crate::overrides::OverrideSet;
use crate::primitives::{
    DEFAULT_ENTITY_URL_BASE, DEFAULT_RETURNED_LOOKBACK_DAYS, DEFAULT_STRAY_ORIGIN,
    DEFAULT_TRIAL_MARKER, DEFAULT_UNLISTED_WINDOW_DAYS,
};
use crate::resolver::{apply_overrides, enforce_exclusivity};
use crate::timeline::{ExtractedSnapshot, History, latest_records_since};
use crate::{EntityId, EntityRecord, PupdatesError, StatusTag};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::iter;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunables of the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Case-insensitive location substring of a trial adoption.
    pub trial_marker: String,
    /// Origin value of stray intakes, excluded from Returned.
    pub stray_origin: String,
    /// Days before `now` covered by the unlisted reconciliation.
    pub unlisted_window_days: u32,
    /// Days before latest's date searched for a prior adoption.
    pub returned_lookback_days: u32,
    /// Prefix of generated entity urls.
    pub entity_url_base: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            trial_marker: DEFAULT_TRIAL_MARKER.to_string(),
            stray_origin: DEFAULT_STRAY_ORIGIN.to_string(),
            unlisted_window_days: DEFAULT_UNLISTED_WINDOW_DAYS,
            returned_lookback_days: DEFAULT_RETURNED_LOOKBACK_DAYS,
            entity_url_base: DEFAULT_ENTITY_URL_BASE.to_string(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), PupdatesError> {
        if self.trial_marker.trim().is_empty() {
            return Err(PupdatesError::InvalidConfig(
                "trial_marker must not be empty".to_string(),
            ));
        }
        if self.returned_lookback_days == 0 {
            return Err(PupdatesError::InvalidConfig(
                "returned_lookback_days must be at least 1".to_string(),
            ));
        }
        if self.entity_url_base.trim().is_empty() {
            return Err(PupdatesError::InvalidConfig(
                "entity_url_base must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Everything one classification depends on.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub latest: &'a ExtractedSnapshot,
    pub previous: &'a ExtractedSnapshot,
    /// Snapshots older than `previous`.
    pub history: &'a History,
    pub overrides: &'a OverrideSet,
    pub now: NaiveDateTime,
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// The canonical lifecycle classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    /// Create a classifier with a validated configuration.
    pub fn new(config: ClassifierConfig) -> Result<Self, PupdatesError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one run.
    #[must_use]
    pub fn classify(&self, input: &ClassifierInput<'_>) -> ClassifiedDiff {
        let mut placements = Placements::new(&self.config.entity_url_base);

        self.classify_disappeared(input, &mut placements);
        self.classify_appeared(input, &mut placements);
        self.classify_current(input, &mut placements);
        self.reconcile_unlisted(input, &mut placements);

        let mut diff = enforce_exclusivity(placements.into_diff());
        self.apply_exclusions(input, &mut diff);

        apply_overrides(
            diff,
            input.overrides,
            input.latest,
            &self.config.entity_url_base,
        )
    }

    /// Step 1: in previous, absent from latest.
    fn classify_disappeared(&self, input: &ClassifierInput<'_>, placements: &mut Placements<'_>) {
        for record in input.previous.records() {
            if input.latest.contains(record.entity_id) {
                continue;
            }
            let category = if record.is_adopted_equivalent() {
                Category::Adopted
            } else if record.has_location_marker(&self.config.trial_marker) {
                Category::Trial
            } else {
                Category::Unlisted
            };
            placements.place(category, record);
        }
    }

    /// Step 2: in latest, absent from previous.
    fn classify_appeared(&self, input: &ClassifierInput<'_>, placements: &mut Placements<'_>) {
        let today = input.latest.date();
        for record in input.latest.records() {
            if input.previous.contains(record.entity_id) {
                continue;
            }
            match detect_appearance(
                record.entity_id,
                input.history,
                today,
                self.config.returned_lookback_days,
            ) {
                Appearance::New => placements.place(Category::New, record),
                Appearance::Returned => placements.place(Category::Returned, record),
                Appearance::Relisted => {}
            }
        }
    }

    /// Step 3: currently on trial, or adopted since the last sighting.
    fn classify_current(&self, input: &ClassifierInput<'_>, placements: &mut Placements<'_>) {
        for record in input.latest.records() {
            if record.has_location_marker(&self.config.trial_marker) {
                placements.place(Category::Trial, record);
            }
            if record.is_adopted_equivalent() {
                let prior = input
                    .previous
                    .get(record.entity_id)
                    .or_else(|| input.history.timeline(record.entity_id).most_recent());
                if prior.is_some_and(|p| !p.is_adopted_equivalent()) {
                    placements.place(Category::Adopted, record);
                }
            }
        }
    }

    /// Step 4: presumed present but missing from latest.
    fn reconcile_unlisted(&self, input: &ClassifierInput<'_>, placements: &mut Placements<'_>) {
        let cutoff = days_before(input.now.date(), self.config.unlisted_window_days);
        let window = iter::once(input.previous).chain(input.history.snapshots());

        for (entity, (_, record)) in latest_records_since(window, cutoff) {
            if input.latest.contains(entity) {
                continue;
            }
            if !record.has_empty_location()
                && !record.has_location_marker(&self.config.trial_marker)
                && record.status.is_active()
            {
                placements.place(Category::Unlisted, record);
            }
        }
    }

    /// Step 5: euthanized everywhere, strays from Returned.
    fn apply_exclusions(&self, input: &ClassifierInput<'_>, diff: &mut ClassifiedDiff) {
        diff.retain(|category, summary| {
            let entity = summary.entity_id;
            if most_recent_status(input, entity) == Some(StatusTag::Euthanized) {
                return false;
            }
            if category == Category::Returned {
                let stray = input
                    .latest
                    .get(entity)
                    .is_some_and(|r| r.has_origin(&self.config.stray_origin));
                return !stray;
            }
            true
        });
    }
}

/// Newest status of `entity` across latest, previous and history.
fn most_recent_status(input: &ClassifierInput<'_>, entity: EntityId) -> Option<StatusTag> {
    input
        .latest
        .get(entity)
        .or_else(|| input.previous.get(entity))
        .or_else(|| input.history.timeline(entity).most_recent())
        .map(|r| r.status)
}

fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

// =============================================================================
// PLACEMENTS
// =============================================================================

/// Candidate placements. An entity may be proposed for several lists;
/// `enforce_exclusivity` settles it.
struct Placements<'a> {
    url_base: &'a str,
    diff: ClassifiedDiff,
}

impl<'a> Placements<'a> {
    fn new(url_base: &'a str) -> Self {
        Self {
            url_base,
            diff: ClassifiedDiff::default(),
        }
    }

    fn place(&mut self, category: Category, record: &EntityRecord) {
        self.diff
            .push(category, EntitySummary::from_record(record, self.url_base));
    }

    fn into_diff(self) -> ClassifiedDiff {
        self.diff
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotId;
    use crate::overrides::Override;
    use crate::primitives::DEFAULT_SNAPSHOT_PREFIX;

    fn snapshot(raw: &str, records: Vec<EntityRecord>) -> ExtractedSnapshot {
        ExtractedSnapshot::from_records(
            SnapshotId::parse(DEFAULT_SNAPSHOT_PREFIX, raw).expect("id"),
            records,
        )
    }

    fn rec(n: u64, status: StatusTag, location: &str) -> EntityRecord {
        EntityRecord::new(EntityId(n), format!("dog-{n}"), status, location)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 30)
            .and_then(|d| d.and_hms_opt(16, 0, 0))
            .expect("now")
    }

    struct Fixture {
        latest: ExtractedSnapshot,
        previous: ExtractedSnapshot,
        history: History,
        overrides: OverrideSet,
    }

    impl Fixture {
        fn new(previous: Vec<EntityRecord>, latest: Vec<EntityRecord>) -> Self {
            Self {
                latest: snapshot("animal-humane-20251230-1500", latest),
                previous: snapshot("animal-humane-20251230-0900", previous),
                history: History::default(),
                overrides: OverrideSet::new(),
            }
        }

        fn with_history(mut self, history: Vec<ExtractedSnapshot>) -> Self {
            self.history = History::from_snapshots(history);
            self
        }

        fn run(&self) -> ClassifiedDiff {
            Classifier::default().classify(&ClassifierInput {
                latest: &self.latest,
                previous: &self.previous,
                history: &self.history,
                overrides: &self.overrides,
                now: now(),
            })
        }
    }

    #[test]
    fn disappeared_follows_precedence_chain() {
        let diff = Fixture::new(
            vec![
                rec(1, StatusTag::Adopted, "Kennel-1"),
                rec(2, StatusTag::Available, ""),
                rec(3, StatusTag::Available, "Main Campus - Trial Adoption"),
                rec(4, StatusTag::Available, "Kennel-4"),
            ],
            vec![],
        )
        .run();

        assert_eq!(diff.ids(Category::Adopted), vec![EntityId(1), EntityId(2)]);
        assert_eq!(diff.ids(Category::Trial), vec![EntityId(3)]);
        assert_eq!(diff.ids(Category::Unlisted), vec![EntityId(4)]);
    }

    #[test]
    fn listed_trial_is_reported_every_run() {
        let on_trial = rec(5, StatusTag::Available, "TRIAL ADOPTION");
        let diff = Fixture::new(vec![on_trial.clone()], vec![on_trial]).run();
        assert_eq!(diff.ids(Category::Trial), vec![EntityId(5)]);
    }

    #[test]
    fn trial_superseded_by_empty_location_is_adopted() {
        let diff = Fixture::new(
            vec![rec(6, StatusTag::Available, "Trial Adoption")],
            vec![rec(6, StatusTag::Available, "")],
        )
        .run();
        assert_eq!(diff.ids(Category::Adopted), vec![EntityId(6)]);
        assert!(diff.trial.is_empty());
    }

    #[test]
    fn new_arrival_on_trial_is_reported_once() {
        let diff = Fixture::new(vec![], vec![rec(8, StatusTag::Available, "Trial Adoption")]).run();
        assert_eq!(diff.ids(Category::Trial), vec![EntityId(8)]);
        assert!(diff.new.is_empty());
        assert_eq!(diff.total(), 1);
    }

    #[test]
    fn already_adopted_entity_is_not_reported_again() {
        let adopted = rec(7, StatusTag::Adopted, "");
        let diff = Fixture::new(vec![adopted.clone()], vec![adopted]).run();
        assert!(diff.is_empty());
    }

    #[test]
    fn unlisted_window_catches_entities_missing_for_days() {
        let diff = Fixture::new(vec![], vec![])
            .with_history(vec![
                snapshot(
                    "animal-humane-20251227-1500",
                    vec![rec(8, StatusTag::Available, "Kennel-8")],
                ),
                snapshot(
                    "animal-humane-20251201-1500",
                    vec![rec(9, StatusTag::Available, "Kennel-9")],
                ),
            ])
            .run();
        assert_eq!(diff.ids(Category::Unlisted), vec![EntityId(8)]);
    }

    #[test]
    fn unlisted_window_skips_adopted_and_trial_records() {
        let diff = Fixture::new(vec![], vec![])
            .with_history(vec![snapshot(
                "animal-humane-20251228-1500",
                vec![
                    rec(10, StatusTag::Adopted, "Kennel"),
                    rec(11, StatusTag::Available, "Trial Adoption"),
                    rec(12, StatusTag::Available, ""),
                ],
            )])
            .run();
        assert!(diff.is_empty());
    }

    #[test]
    fn euthanized_is_excluded_everywhere() {
        let diff = Fixture::new(
            vec![rec(13, StatusTag::Euthanized, "Kennel-13")],
            vec![],
        )
        .run();
        assert!(diff.is_empty());
    }

    #[test]
    fn stray_intake_is_not_a_return() {
        let diff = Fixture::new(
            vec![],
            vec![rec(14, StatusTag::Available, "Kennel-14").with_origin("Stray")],
        )
        .with_history(vec![snapshot(
            "animal-humane-20251201-1500",
            vec![rec(14, StatusTag::Adopted, "")],
        )])
        .run();
        assert!(diff.is_empty());
    }

    #[test]
    fn relisted_without_adoption_is_not_reported() {
        let diff = Fixture::new(vec![], vec![rec(15, StatusTag::Available, "Kennel-15")])
            .with_history(vec![snapshot(
                "animal-humane-20251228-1500",
                vec![rec(15, StatusTag::Available, "Kennel-15")],
            )])
            .run();
        assert_eq!(diff.category_of(EntityId(15)), None);
    }

    #[test]
    fn override_beats_exclusions() {
        let mut fixture = Fixture::new(
            vec![rec(16, StatusTag::Euthanized, "Kennel-16")],
            vec![],
        );
        fixture.overrides.insert(Override {
            entity_id: EntityId(16),
            name: "Sixteen".to_string(),
        });
        let diff = fixture.run();
        assert_eq!(diff.ids(Category::Adopted), vec![EntityId(16)]);
        assert_eq!(diff.adopted[0].name, "Sixteen");
    }

    #[test]
    fn config_validation_rejects_blank_marker() {
        let config = ClassifierConfig {
            trial_marker: " ".to_string(),
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            Classifier::new(config),
            Err(PupdatesError::InvalidConfig(_))
        ));
    }
}
