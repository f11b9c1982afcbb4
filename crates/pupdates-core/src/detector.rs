//! # New/Returned Detector
//!
//! Decides what an entity that appeared in `latest` (and was absent from
//! `previous`) is.
//!
//! "Today" is the calendar date embedded in latest's identifier, never the
//! wall clock, so a late run still classifies against its business day.
//! Only history dated before today and inside the lookback is consulted.

use crate::timeline::History;
use crate::EntityId;
use chrono::{Days, NaiveDate};

/// Outcome for an appeared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    /// No record before today inside the lookback.
    New,
    /// Seen before today with an adopted or reclaimed status.
    Returned,
    /// Seen before today, never adopted: a relisting, not reported.
    Relisted,
}

/// Classify an appeared entity against pre-today history.
#[must_use]
pub fn detect_appearance(
    entity: EntityId,
    history: &History,
    today: NaiveDate,
    lookback_days: u32,
) -> Appearance {
    let from = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);

    let timeline = history.timeline(entity);
    let mut seen = false;
    for (_, record) in timeline.dated_between(from, today) {
        if record.status.is_adopted_like() {
            return Appearance::Returned;
        }
        seen = true;
    }

    if seen {
        Appearance::Relisted
    } else {
        Appearance::New
    }
}
