//! Static configuration for the taskdeck core.
//!
//! Loaded once at startup from `config.toml` in the app config directory.
//! Everything here is deploy-time configuration; user-mutable state lives in
//! [`crate::settings`] instead.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Kakao OAuth and messaging endpoint settings.
    pub kakao: KakaoConfig,
    /// Reminder engine timing.
    pub reminders: ReminderConfig,
}

/// Kakao OAuth and messaging endpoint settings.
///
/// The base URLs default to the production Kakao hosts; tests point them at a
/// local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KakaoConfig {
    /// REST API key (OAuth client id).
    pub client_id: String,
    /// Redirect URI registered with the Kakao app.
    pub redirect_uri: String,
    /// Base URL of the OAuth authorization/token host.
    pub auth_base_url: String,
    /// Base URL of the messaging/logout API host.
    pub api_base_url: String,
    /// Per-request timeout in seconds for token and messaging calls. Sends
    /// run while the board lock is held, so a hung endpoint must give up
    /// rather than stall the board.
    pub request_timeout_secs: u64,
}

impl Default for KakaoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: String::new(),
            auth_base_url: "https://kauth.kakao.com".to_owned(),
            api_base_url: "https://kapi.kakao.com".to_owned(),
            request_timeout_secs: 10,
        }
    }
}

/// Reminder engine timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Seconds between deadline scans.
    pub poll_interval_secs: u64,
    /// Width of the imminent-deadline window in seconds.
    pub imminent_window_secs: u64,
    /// Maximum task titles listed in the startup summary notice.
    pub summary_max_items: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15 * 60,
            imminent_window_secs: 3600,
            summary_max_items: 4,
        }
    }
}

impl TrackerConfig {
    /// Default path of the config file (`config.toml` in the app config dir).
    #[must_use]
    pub fn default_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }

    /// Load configuration from the given path.
    ///
    /// A missing file yields the default configuration; a malformed file is
    /// an error (a broken deployment should be visible, not silently
    /// defaulted).
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(TrackerError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        toml::from_str(&contents)
            .map_err(|e| TrackerError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }
}
