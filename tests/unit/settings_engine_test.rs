//! Integration-level unit tests for the SettingsEngine public API.
//!
//! These tests exercise the SettingsEngine through its public trait interface,
//! validating default loading, value persistence, and reset behavior.

use marksync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use marksync::types::errors::SettingsError;
use marksync::types::settings::SyncSettings;
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

/// When no config file exists on disk, `load()` must return the built-in
/// defaults so a session can start without prior configuration.
#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, SyncSettings::default());
    assert_eq!(settings.delete_confirm_window_ms, 3000);
    assert_eq!(settings.channels.change_feed_prefix, "db-changes");
    assert!(settings.database_path.is_none());
}

/// After calling `set_value`, a new engine reading the same file sees the update.
#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value("channels.broadcast_prefix", serde_json::json!("marks"))
            .unwrap();
    }

    {
        let mut engine2 = engine_in_temp(&dir);
        let loaded = engine2.load().unwrap();
        assert_eq!(loaded.channels.broadcast_prefix, "marks");
    }
}

/// After modifying settings and calling `reset()`, all values revert to
/// defaults and the defaults are persisted to disk.
#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value("delete_confirm_window_ms", serde_json::json!(750))
            .unwrap();
        engine
            .set_value("default_url_scheme", serde_json::json!("http"))
            .unwrap();
        engine.reset().unwrap();
        assert_eq!(*engine.get_settings(), SyncSettings::default());
    }

    let mut engine2 = engine_in_temp(&dir);
    assert_eq!(engine2.load().unwrap(), SyncSettings::default());
}

#[test]
fn test_set_value_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value("channels.nope", serde_json::json!(true));
    assert!(matches!(result, Err(SettingsError::InvalidKey(_))));
    let result = engine.set_value("", serde_json::json!(true));
    assert!(matches!(result, Err(SettingsError::InvalidKey(_))));
}

#[test]
fn test_malformed_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    std::fs::write(engine.get_config_path(), "{ not json").unwrap();

    let result = engine.load();
    assert!(matches!(result, Err(SettingsError::SerializationError(_))));
}

/// `save()` creates missing parent directories.
#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("settings.json");
    let engine = SettingsEngine::new(Some(path.to_string_lossy().to_string()));

    engine.save().unwrap();
    assert!(path.exists());
}
