//! Configuration layering and override loading.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use pupdates::config::{Config, SourceKind, load_overrides};
use pupdates_core::{EntityId, PupdatesError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn test_empty_file_is_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.source.kind, SourceKind::Elasticsearch);
    assert_eq!(config.source.snapshot_prefix, "animal-humane-");
    assert_eq!(config.windows.unlisted_days, 7);
    assert_eq!(config.windows.returned_lookback_days, 90);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let config = Config::from_toml(
        r#"
        [source]
        kind = "local"
        store_path = "/var/lib/pupdates/store.redb"

        [windows]
        unlisted_days = 3

        [fetch]
        max_concurrent = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.source.kind, SourceKind::Local);
    assert_eq!(config.source.store_path, PathBuf::from("/var/lib/pupdates/store.redb"));
    assert_eq!(config.windows.unlisted_days, 3);
    assert_eq!(config.windows.returned_lookback_days, 90);
    assert_eq!(config.fetch.max_concurrent, 2);
    assert_eq!(config.fetch.attempts, 2);

    let classifier = config.classifier_config();
    assert_eq!(classifier.unlisted_window_days, 3);
    assert_eq!(classifier.trial_marker, "trial adoption");
}

#[test]
fn test_es_alias_is_accepted() {
    let config = Config::from_toml("[source]\nkind = \"es\"\n").unwrap();
    assert_eq!(config.source.kind, SourceKind::Elasticsearch);
}

#[test]
fn test_unknown_key_is_rejected() {
    let err = Config::from_toml("[windows]\nunlisted = 3\n").unwrap_err();
    assert!(matches!(err, PupdatesError::InvalidConfig(_)));
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, PupdatesError::InvalidConfig(_)));
}

#[test]
fn test_load_reads_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pupdates.toml");
    std::fs::write(&path, "[output]\ndir = \"out\"\ncsv = false\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.output.dir, PathBuf::from("out"));
    assert!(!config.output.csv);
    assert!(config.output.json);
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

#[test]
fn test_environment_overrides_file_values() {
    let env: BTreeMap<&str, &str> = [
        ("PUPDATES_ES_URL", "http://search.internal:9200"),
        ("PUPDATES_STORE", "/tmp/store.redb"),
        ("PUPDATES_OVERRIDES", ""),
    ]
    .into_iter()
    .collect();

    let config = Config::default().with_env_from(|key| env.get(key).map(|v| v.to_string()));
    assert_eq!(config.source.endpoint, "http://search.internal:9200");
    assert_eq!(config.source.store_path, PathBuf::from("/tmp/store.redb"));
    // Blank values are ignored.
    assert_eq!(
        config.source.overrides_path,
        PathBuf::from("overrides/adopted_today.json")
    );
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn test_validation_rejects_unusable_values() {
    let mut config = Config::default();
    config.fetch.max_concurrent = 0;
    assert!(matches!(config.validate(), Err(PupdatesError::InvalidConfig(_))));

    let mut config = Config::default();
    config.fetch.attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.source.snapshot_prefix.clear();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.classifier.trial_marker = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.windows.returned_lookback_days = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_backoff_doubles_and_caps() {
    let config = Config::from_toml("[fetch]\nbackoff_ms = 100\nmax_backoff_ms = 350\n").unwrap();
    assert_eq!(config.fetch.backoff(1), Duration::from_millis(100));
    assert_eq!(config.fetch.backoff(2), Duration::from_millis(200));
    assert_eq!(config.fetch.backoff(3), Duration::from_millis(350));
    assert_eq!(config.fetch.backoff(40), Duration::from_millis(350));
}

// =============================================================================
// OVERRIDES
// =============================================================================

#[test]
fn test_missing_override_file_means_no_overrides() {
    let dir = tempdir().unwrap();
    let overrides = load_overrides(&dir.path().join("adopted_today.json")).unwrap();
    assert!(overrides.is_empty());
}

#[test]
fn test_override_file_is_loaded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("adopted_today.json");
    std::fs::write(
        &path,
        r#"[{"dog_id": 212, "name": "Mochi"}, {"entity_id": 7, "name": "Juniper"}]"#,
    )
    .unwrap();

    let overrides = load_overrides(&path).unwrap();
    assert_eq!(overrides.len(), 2);
    assert!(overrides.contains(EntityId(212)));
    assert!(overrides.contains(EntityId(7)));
}

#[test]
fn test_invalid_override_file_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("adopted_today.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = load_overrides(&path).unwrap_err();
    assert!(matches!(err, PupdatesError::InvalidOverrides(_)));
}
