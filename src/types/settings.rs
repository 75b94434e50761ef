use serde::{Deserialize, Serialize};

/// Top-level sync settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// SQLite file backing the shared store; in-memory when unset.
    pub database_path: Option<String>,
    pub channels: ChannelSettings,
    /// How long a first delete press stays armed.
    pub delete_confirm_window_ms: u64,
    /// Scheme prepended to URLs typed without one.
    pub default_url_scheme: String,
    /// `tracing` env-filter directive for the binaries.
    pub log_filter: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            channels: ChannelSettings::default(),
            delete_confirm_window_ms: 3000,
            default_url_scheme: "https".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

/// Naming and delivery options for the two notification channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelSettings {
    pub change_feed_prefix: String,
    pub broadcast_prefix: String,
    pub receive_own_broadcasts: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            change_feed_prefix: "db-changes".to_string(),
            broadcast_prefix: "bookmark-broadcast".to_string(),
            receive_own_broadcasts: false,
        }
    }
}
