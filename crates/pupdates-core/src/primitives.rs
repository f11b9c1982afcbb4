//! # Primitives
//!
//! Compiled-in defaults for the Pupdates CORE.
//!
//! Every value here that shapes classification is only a DEFAULT: the
//! classifier and catalog take them through `ClassifierConfig` and the
//! app's configuration file, never as magic constants at call sites.

/// Default prefix of snapshot identifiers (`animal-humane-YYYYMMDD-HHMM`).
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "animal-humane-";

/// chrono format of the time component embedded in snapshot identifiers.
pub const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%d-%H%M";

/// Location substring that marks a provisional (trial) adoption.
pub const DEFAULT_TRIAL_MARKER: &str = "trial adoption";

/// Origin value of stray intakes.
pub const DEFAULT_STRAY_ORIGIN: &str = "Stray";

/// Rolling window, in days, for the unlisted reconciliation.
pub const DEFAULT_UNLISTED_WINDOW_DAYS: u32 = 7;

/// How far back, in days, the returned detector looks for a prior adoption.
pub const DEFAULT_RETURNED_LOOKBACK_DAYS: u32 = 90;

/// Public listing page; the entity id is appended.
pub const DEFAULT_ENTITY_URL_BASE: &str = "https://new.shelterluv.com/embed/animal/";

// =============================================================================
// RECORD FORMAT
// =============================================================================

/// Magic bytes for the stored record format header.
pub const MAGIC_BYTES: &[u8; 4] = b"PUPD";

/// Current stored record format version.
///
/// Increment this when making breaking changes to the record format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of records accepted for one snapshot.
///
/// The shelter lists a few hundred animals; anything near this is a bad dump.
pub const MAX_RECORDS_PER_SNAPSHOT: usize = 50_000;

/// Maximum size of one encoded record (1 MB).
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;
