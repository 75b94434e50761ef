// marksync Settings Engine
// Persists `SyncSettings` as pretty JSON at `<config dir>/settings.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::SyncSettings;

const SETTINGS_FILE: &str = "settings.json";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<SyncSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &SyncSettings;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &Path;
}

pub struct SettingsEngine {
    config_path: PathBuf,
    settings: SyncSettings,
}

impl SettingsEngine {
    /// Uses `path_override` when given, else `settings.json` in the platform config dir.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override
            .map(PathBuf::from)
            .unwrap_or_else(|| platform::get_config_dir().join(SETTINGS_FILE));
        Self {
            config_path,
            settings: SyncSettings::default(),
        }
    }

    fn serialization(context: &str, err: serde_json::Error) -> SettingsError {
        SettingsError::SerializationError(format!("{}: {}", context, err))
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// A missing file yields defaults; a malformed one is an error. Keys absent
    /// from the file keep their default values.
    fn load(&mut self) -> Result<SyncSettings, SettingsError> {
        self.settings = match fs::read_to_string(&self.config_path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Self::serialization("Failed to parse config file", e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SyncSettings::default(),
            Err(e) => {
                return Err(SettingsError::IoError(format!("Failed to read config file: {}", e)))
            }
        };
        debug!(target: "marksync.settings", path = %self.config_path.display(), "settings loaded");
        Ok(self.settings.clone())
    }

    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }
        let json = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| Self::serialization("Failed to serialize settings", e))?;
        fs::write(&self.config_path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Updates one setting by dot path (`channels.receive_own_broadcasts`) and saves.
    ///
    /// The new tree is re-parsed as `SyncSettings`, so a value of the wrong type
    /// is rejected and nothing changes.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        if key.is_empty() || key.contains(['/', '~']) {
            return Err(SettingsError::InvalidKey(format!("Malformed key '{}'", key)));
        }

        let mut tree = serde_json::to_value(&self.settings)
            .map_err(|e| Self::serialization("Failed to serialize settings", e))?;
        let pointer = format!("/{}", key.replace('.', "/"));
        let slot = tree
            .pointer_mut(&pointer)
            .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        *slot = value;

        self.settings = serde_json::from_value(tree).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = SyncSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}
