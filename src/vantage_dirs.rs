//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution; on Linux
//! this honours `XDG_CONFIG_HOME` and `XDG_DATA_HOME`.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Config | `~/.config/vantage/` | `~/Library/Application Support/vantage/` |
//! | Data | `~/.local/share/vantage/` | `~/Library/Application Support/vantage/` |
//!
//! Overrides for tests and custom deployments:
//! - `VANTAGE_CONFIG_DIR` overrides [`config_dir`]
//! - `VANTAGE_DATA_DIR` overrides [`data_dir`]

use std::path::PathBuf;

/// Directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VANTAGE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("vantage"))
        .unwrap_or_else(|| PathBuf::from("/tmp/vantage-config"))
}

/// Directory holding persistent data such as the knowledge file.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VANTAGE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("vantage"))
        .unwrap_or_else(|| PathBuf::from("/tmp/vantage-data"))
}

/// Default configuration file path.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default knowledge file path.
#[must_use]
pub fn knowledge_file() -> PathBuf {
    data_dir().join("knowledge.json")
}
