//! Property-based tests for SyncSettings serialization round-trip.
//!
//! These verify that SyncSettings can be serialized to JSON and deserialized
//! back without data loss, directly and through the SettingsEngine on disk.

use marksync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use marksync::types::settings::{ChannelSettings, SyncSettings};
use proptest::prelude::*;

fn arb_channel_settings() -> impl Strategy<Value = ChannelSettings> {
    ("[a-z][a-z-]{0,20}", "[a-z][a-z-]{0,20}", any::<bool>()).prop_map(
        |(change_feed_prefix, broadcast_prefix, receive_own_broadcasts)| ChannelSettings {
            change_feed_prefix,
            broadcast_prefix,
            receive_own_broadcasts,
        },
    )
}

fn arb_sync_settings() -> impl Strategy<Value = SyncSettings> {
    (
        proptest::option::of("[a-zA-Z0-9/._-]{1,40}"),
        arb_channel_settings(),
        0u64..600_000,
        prop_oneof![Just("https"), Just("http")],
        prop_oneof![Just("info"), Just("debug"), Just("marksync=trace,warn")],
    )
        .prop_map(
            |(database_path, channels, delete_confirm_window_ms, scheme, log_filter)| SyncSettings {
                database_path,
                channels,
                delete_confirm_window_ms,
                default_url_scheme: scheme.to_string(),
                log_filter: log_filter.to_string(),
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn settings_json_roundtrip(settings in arb_sync_settings()) {
        let json = serde_json::to_string(&settings).expect("serialize");
        let back: SyncSettings = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(settings, back);
    }

    /// Whatever `set_value` writes is what the next engine loads.
    #[test]
    fn settings_engine_persists_window(window in 0u64..600_000) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();

        let mut engine = SettingsEngine::new(Some(path.clone()));
        engine.load().unwrap();
        engine.set_value("delete_confirm_window_ms", serde_json::json!(window)).unwrap();

        let mut reloaded = SettingsEngine::new(Some(path));
        prop_assert_eq!(reloaded.load().unwrap().delete_confirm_window_ms, window);
    }
}
