//! Pretty JSON persistence with path-carrying errors.

use fusion_core::FusionError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FusionError> {
    let text = fs::read_to_string(path).map_err(|e| FusionError::acquisition(path, e))?;
    serde_json::from_str(&text).map_err(|e| FusionError::acquisition(path, e))
}

/// Serialize `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), FusionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FusionError::acquisition(parent, e))?;
        }
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| FusionError::acquisition(path, e))?;
    fs::write(path, text).map_err(|e| FusionError::acquisition(path, e))
}
