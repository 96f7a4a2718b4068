//! Centralized application directory paths for taskdeck.
//!
//! Single source of truth for the filesystem paths used by the core. Uses the
//! [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `TASKDECK_CONFIG_DIR` overrides [`config_dir`]
//! - `TASKDECK_DATA_DIR` overrides [`data_dir`]
//! - `TASKDECK_RUNTIME_DIR` overrides [`runtime_dir`]

use std::path::PathBuf;

/// Application config directory.
///
/// Holds `config.toml` and `settings.json`. Resolves to
/// `dirs::config_dir()/taskdeck/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("TASKDECK_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("taskdeck"))
        .unwrap_or_else(|| PathBuf::from("/tmp/taskdeck-config"))
}

/// Application data directory.
///
/// Holds the task/platform item store (`items.json`).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("TASKDECK_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("taskdeck"))
        .unwrap_or_else(|| PathBuf::from("/tmp/taskdeck-data"))
}

/// Runtime directory for process-lifetime artifacts.
///
/// Holds the single-instance lock file and the activation socket. Falls back
/// to the data directory when the platform has no runtime dir.
#[must_use]
pub fn runtime_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("TASKDECK_RUNTIME_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::runtime_dir()
        .map(|d| d.join("taskdeck"))
        .unwrap_or_else(data_dir)
}
