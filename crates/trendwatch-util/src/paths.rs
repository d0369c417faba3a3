//! Default paths for trendwatch components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/trendwatch/config.toml` or `~/.config/trendwatch/config.toml`
//! - Data: `$XDG_DATA_HOME/trendwatch` or `~/.local/share/trendwatch`
//! - Sessions and screenshots live under the data directory

use std::path::{Path, PathBuf};

/// Environment variable for overriding the config file path
pub const TRENDWATCH_CONFIG_ENV: &str = "TRENDWATCH_CONFIG";

/// Environment variable for overriding the data directory
pub const TRENDWATCH_DATA_DIR_ENV: &str = "TRENDWATCH_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "trendwatch";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$TRENDWATCH_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/trendwatch/config.toml`
/// 3. `~/.config/trendwatch/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(TRENDWATCH_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$TRENDWATCH_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/trendwatch` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/trendwatch` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(TRENDWATCH_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking TRENDWATCH_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Directory holding one persisted session file per site
pub fn session_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

/// Directory receiving diagnostic screenshots from failed runs
pub fn screenshot_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("screenshots")
}

/// SQLite database file inside the data directory
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("trendwatch.db")
}
