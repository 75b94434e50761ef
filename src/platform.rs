// marksync platform paths
// Config lives under $MARKSYNC_CONFIG_DIR when set, otherwise the platform's
// per-user config directory.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "MARKSYNC_CONFIG_DIR";

/// Returns the configuration directory for marksync.
///
/// - **Override**: `$MARKSYNC_CONFIG_DIR`
/// - **Windows**: `%APPDATA%\marksync`
/// - **Other**: `$XDG_CONFIG_HOME/marksync`, else `~/.config/marksync`
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| String::from("."));
        PathBuf::from(appdata).join("marksync")
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg).join("marksync")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
            PathBuf::from(home).join(".config").join("marksync")
        }
    }
}
