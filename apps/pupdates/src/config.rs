//! # Configuration
//!
//! `pupdates.toml`, then environment, then CLI flags. Every table and key is
//! optional; a missing file means compiled-in defaults.
//!
//! ```toml
//! [source]
//! kind = "elasticsearch"           # or "local"
//! endpoint = "http://localhost:9200"
//! store_path = "pupdates.redb"
//! snapshot_prefix = "animal-humane-"
//! overrides_path = "overrides/adopted_today.json"
//!
//! [windows]
//! unlisted_days = 7
//! returned_lookback_days = 90
//!
//! [fetch]
//! max_concurrent = 6
//! timeout_secs = 20
//! attempts = 2
//! backoff_ms = 500
//! deadline_secs = 300
//!
//! [classifier]
//! trial_marker = "trial adoption"
//! stray_origin = "Stray"
//! entity_url_base = "https://new.shelterluv.com/embed/animal/"
//!
//! [output]
//! dir = "diff_reports"
//! ```
//!
//! Environment: `PUPDATES_ES_URL`, `PUPDATES_STORE`, `PUPDATES_OVERRIDES`.

use pupdates_core::primitives::{
    DEFAULT_ENTITY_URL_BASE, DEFAULT_RETURNED_LOOKBACK_DAYS, DEFAULT_SNAPSHOT_PREFIX,
    DEFAULT_STRAY_ORIGIN, DEFAULT_TRIAL_MARKER, DEFAULT_UNLISTED_WINDOW_DAYS,
};
use pupdates_core::{ClassifierConfig, OverrideSet, PupdatesError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "pupdates.toml";

/// Maximum config / override file size (1 MB).
const MAX_SMALL_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Elasticsearch-compatible HTTP store.
    #[default]
    #[serde(alias = "es")]
    #[value(alias = "es")]
    Elasticsearch,
    /// Local redb snapshot store.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub endpoint: String,
    pub store_path: PathBuf,
    pub snapshot_prefix: String,
    pub overrides_path: PathBuf,
    /// Documents requested per snapshot search.
    pub page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            endpoint: "http://localhost:9200".to_string(),
            store_path: PathBuf::from("pupdates.redb"),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
            overrides_path: PathBuf::from("overrides/adopted_today.json"),
            page_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowsConfig {
    pub unlisted_days: u32,
    pub returned_lookback_days: u32,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            unlisted_days: DEFAULT_UNLISTED_WINDOW_DAYS,
            returned_lookback_days: DEFAULT_RETURNED_LOOKBACK_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub max_concurrent: usize,
    pub timeout_secs: u64,
    pub attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub deadline_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            timeout_secs: 20,
            attempts: 2,
            backoff_ms: 500,
            max_backoff_ms: 4_000,
            deadline_secs: 300,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Exponential backoff before retry `attempt` (1-based), capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_ms.max(1);
        let max = self.max_backoff_ms.max(base);
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(base.saturating_mul(factor).min(max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSection {
    pub trial_marker: String,
    pub stray_origin: String,
    pub entity_url_base: String,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            trial_marker: DEFAULT_TRIAL_MARKER.to_string(),
            stray_origin: DEFAULT_STRAY_ORIGIN.to_string(),
            entity_url_base: DEFAULT_ENTITY_URL_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub json: bool,
    pub summary: bool,
    pub csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("diff_reports"),
            json: true,
            summary: true,
            csv: true,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub windows: WindowsConfig,
    pub fetch: FetchConfig,
    pub classifier: ClassifierSection,
    pub output: OutputConfig,
}

impl Config {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, PupdatesError> {
        toml::from_str(text).map_err(|e| PupdatesError::InvalidConfig(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `pupdates.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, PupdatesError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                return Err(PupdatesError::InvalidConfig(format!(
                    "config file '{}' not found",
                    path.display()
                )));
            }
            tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        let text = read_small_file(&path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from `lookup`.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("PUPDATES_ES_URL").filter(|v| !v.trim().is_empty()) {
            self.source.endpoint = url;
        }
        if let Some(path) = lookup("PUPDATES_STORE").filter(|v| !v.trim().is_empty()) {
            self.source.store_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("PUPDATES_OVERRIDES").filter(|v| !v.trim().is_empty()) {
            self.source.overrides_path = PathBuf::from(path);
        }
        self
    }

    /// Reject values the runner cannot work with.
    pub fn validate(&self) -> Result<(), PupdatesError> {
        if self.fetch.max_concurrent == 0 {
            return Err(PupdatesError::InvalidConfig(
                "fetch.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.fetch.attempts == 0 {
            return Err(PupdatesError::InvalidConfig(
                "fetch.attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 || self.fetch.deadline_secs == 0 {
            return Err(PupdatesError::InvalidConfig(
                "fetch.timeout_secs and fetch.deadline_secs must be positive".to_string(),
            ));
        }
        if self.source.snapshot_prefix.is_empty() {
            return Err(PupdatesError::InvalidConfig(
                "source.snapshot_prefix must not be empty".to_string(),
            ));
        }
        if self.source.page_size == 0 {
            return Err(PupdatesError::InvalidConfig(
                "source.page_size must be at least 1".to_string(),
            ));
        }
        self.classifier_config().validate()
    }

    /// The core classifier settings.
    #[must_use]
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            trial_marker: self.classifier.trial_marker.clone(),
            stray_origin: self.classifier.stray_origin.clone(),
            unlisted_window_days: self.windows.unlisted_days,
            returned_lookback_days: self.windows.returned_lookback_days,
            entity_url_base: self.classifier.entity_url_base.clone(),
        }
    }
}

// =============================================================================
// OVERRIDES
// =============================================================================

/// Load the override list. A missing file means no overrides.
pub fn load_overrides(path: &Path) -> Result<OverrideSet, PupdatesError> {
    if !path.exists() {
        tracing::info!("No override file at {}, continuing without overrides", path.display());
        return Ok(OverrideSet::new());
    }
    let text = read_small_file(path)?;
    let overrides = OverrideSet::from_json(&text)?;
    tracing::info!("Loaded {} override(s) from {}", overrides.len(), path.display());
    Ok(overrides)
}

fn read_small_file(path: &Path) -> Result<String, PupdatesError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PupdatesError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_SMALL_FILE_SIZE {
        return Err(PupdatesError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SMALL_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| PupdatesError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}
