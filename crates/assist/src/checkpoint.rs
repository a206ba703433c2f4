//! JSON report files.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProviderError;

fn io_error(path: &Path, error: impl std::fmt::Display) -> ProviderError {
    ProviderError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProviderError> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&text).map_err(|e| io_error(path, e))
}

/// Write through a sibling temp file so an interrupted run never leaves a
/// truncated report behind.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProviderError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| io_error(path, e))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, text).map_err(|e| io_error(path, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}
