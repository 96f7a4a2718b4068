//! Durable application settings.
//!
//! One JSON file (`settings.json` in the app config dir) serves both the UI
//! layer (theme, window geometry, last tab) and the core (notification
//! toggle, Kakao token triple). Loaded once at startup, saved on demand.

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

/// Persisted application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// UI theme name ("Light" or "Dark").
    pub theme: String,
    /// Keep the main window above all others.
    pub is_always_on_top: bool,
    /// Master switch for desktop notifications.
    pub are_notifications_enabled: bool,
    /// Last window height in device pixels.
    pub window_height: f64,
    /// Last window width in device pixels.
    pub window_width: f64,
    /// Last window top coordinate.
    pub window_top: f64,
    /// Last window left coordinate.
    pub window_left: f64,
    /// Index of the tab selected when the app last closed.
    pub last_selected_tab_index: i32,
    /// Kakao OAuth access token, when logged in.
    pub kakao_access_token: Option<String>,
    /// Kakao OAuth refresh token. Absent means logged out.
    pub kakao_refresh_token: Option<String>,
    /// UTC expiry of the access token.
    pub kakao_token_expires_at: Option<DateTime<Utc>>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: "Light".to_owned(),
            is_always_on_top: false,
            are_notifications_enabled: true,
            window_height: 700.0,
            window_width: 900.0,
            window_top: 100.0,
            window_left: 100.0,
            last_selected_tab_index: 0,
            kakao_access_token: None,
            kakao_refresh_token: None,
            kakao_token_expires_at: None,
        }
    }
}

/// Shared handle to the settings file.
///
/// Reads never fail: a missing or unparsable file degrades to defaults.
/// Writes surface errors to the caller that asked for the save.
pub struct SettingsStore {
    path: Option<PathBuf>,
    inner: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Default path of the settings file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        crate::app_dirs::config_dir().join("settings.json")
    }

    /// Open the store at the given path, loading current contents.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let settings = load_from_path(&path);
        Self {
            path: Some(path),
            inner: RwLock::new(settings),
        }
    }

    /// Open the store at the default path.
    #[must_use]
    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// In-memory store with default settings. Nothing is persisted.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            inner: RwLock::new(AppSettings::default()),
        }
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> AppSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the in-memory settings without persisting.
    pub fn update(&self, mutate: impl FnOnce(&mut AppSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut guard);
    }

    /// Mutate the in-memory settings and persist the result.
    pub fn update_and_save(&self, mutate: impl FnOnce(&mut AppSettings)) -> Result<()> {
        self.update(mutate);
        self.save()
    }

    /// Persist the current settings to disk.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Settings(format!(
                    "cannot create settings directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| TrackerError::Settings(format!("cannot serialize settings: {e}")))?;

        std::fs::write(path, json).map_err(|e| {
            TrackerError::Settings(format!("cannot write settings to {}: {e}", path.display()))
        })?;

        Ok(())
    }
}

fn load_from_path(path: &PathBuf) -> AppSettings {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("cannot read settings at {}: {e}", path.display());
            }
            return AppSettings::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("ignoring malformed settings at {}: {e}", path.display());
            AppSettings::default()
        }
    }
}
