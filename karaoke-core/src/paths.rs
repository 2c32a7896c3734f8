//! Path constants for configuration and storage files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "karaoke";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the key-value store database file
pub const STORE_DB_FILE_NAME: &str = "karaoke.db";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "karaoke.log";

/// Get the configuration directory path (~/.config/karaoke/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/karaoke/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the key-value store path (`~/.config/karaoke/karaoke.db`)
#[must_use]
pub fn store_db_path() -> PathBuf {
    config_dir().join(STORE_DB_FILE_NAME)
}

/// Get the log file path (`~/.config/karaoke/karaoke.log`)
#[must_use]
pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE_NAME)
}
