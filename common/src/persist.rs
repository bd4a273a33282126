//! Whole-file JSON persistence.
//!
//! Every save writes the complete document to a sibling temp file and renames it
//! over the target, so readers never observe a half-written file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{CommonError, Result};

/// Load a JSON document, returning `T::default()` when the file does not exist.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Data file missing, using empty default");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(CommonError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).map_err(|source| CommonError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let io_err = |source| CommonError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| CommonError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_path(path);
    fs::write(&tmp, content).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), "Data file saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
