//! Persistent storage
//!
//! Handles settings persistence under the platform data directory.

pub mod settings;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

pub use settings::{load_settings, save_settings, Settings};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not determine data directory")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("", "", "podlab")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
