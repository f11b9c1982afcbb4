//! # pupdates-core
//!
//! The deterministic snapshot reconciliation engine for Pupdates - THE LOGIC.
//!
//! Given a sequence of full captures of a shelter's listed population, this
//! crate decides which animals are new, returned, adopted, on a trial
//! adoption, or temporarily unlisted.
//!
//! ## Pipeline
//!
//! - `catalog` orders snapshot identifiers by embedded capture time
//! - `extractor` normalizes raw documents and deduplicates per entity
//! - `timeline` folds extracted snapshots into a recency-ordered history
//! - `classifier` (with `detector` and `resolver`) produces the five lists
//! - `changes` and `report` render what a run found
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never reads the wall clock: `now` is an explicit input
//! - Never logs: recoverable problems are returned as data
//! - Uses BTreeMap/BTreeSet only, so identical inputs give identical bytes

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod changes;
pub mod classifier;
pub mod detector;
pub mod diff;
pub mod extractor;
pub mod formats;
pub mod overrides;
pub mod primitives;
pub mod report;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod timeline;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EntityId, EntityRecord, PupdatesError, SnapshotId, StatusTag};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::SnapshotCatalog;
pub use changes::{FieldChange, TrackedField, detect_changes};
pub use classifier::{Classifier, ClassifierConfig, ClassifierInput};
pub use detector::{Appearance, detect_appearance};
pub use diff::{Category, ClassifiedDiff, EntitySummary};
pub use extractor::{Extraction, RawRecord, extract};
pub use overrides::{Override, OverrideSet};
pub use report::{RunContext, RunReport, render_csv, render_summary};
pub use resolver::{apply_overrides, enforce_exclusivity};
pub use timeline::{EntityTimeline, ExtractedSnapshot, History};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::RedbSnapshotStore;
pub use store::{MemorySnapshotStore, SnapshotStore};
