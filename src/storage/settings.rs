//! Settings storage
//!
//! Manages persistence of the backend origin and request parameters.

use crate::storage::{get_data_dir, StorageError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_length() -> u32 {
    200
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    600
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Origin of the inference backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Cap on generated tokens per chat reply
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    /// Period between model-status polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status polls before a load is declared stuck
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            max_length: default_max_length(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl Settings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        let trimmed = self.backend_url.trim().trim_end_matches('/');
        self.backend_url = if trimmed.is_empty() {
            default_backend_url()
        } else {
            trimmed.to_string()
        };

        self.max_length = self.max_length.clamp(1, 4096);

        // Sub-100ms polling just hammers the backend.
        if self.poll_interval_ms < 100 {
            self.poll_interval_ms = default_poll_interval_ms();
        }

        if self.max_poll_attempts == 0 {
            self.max_poll_attempts = default_max_poll_attempts();
        }
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> Settings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    }
}

fn load_settings_from(path: &Path) -> Result<Settings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(Settings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: Settings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from disk");
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &Settings) -> Result<(), StorageError> {
    save_settings_to(settings, &get_settings_path()?)
}

fn save_settings_to(settings: &Settings, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to disk");
    Ok(())
}
