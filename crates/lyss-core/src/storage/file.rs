//! Whole-file JSON persistence

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// Read a JSON document from `path`.
///
/// Returns `Ok(None)` when the file does not exist or holds only whitespace,
/// so first runs start from an empty store. Anything else that fails to parse,
/// including bytes that are not UTF-8, is reported as [`Error::StorageRead`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Store does not exist; starting empty");
            return Ok(None);
        }
        Err(e) => return Err(Error::Io(e)),
    };

    if raw.iter().all(u8::is_ascii_whitespace) {
        debug!(path = %path.display(), "Store is empty; starting empty");
        return Ok(None);
    }

    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| Error::StorageRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `value` as pretty-printed JSON, replacing `path` atomically.
///
/// The document goes to a sibling temporary file first and is renamed over
/// the target, so a failed write never leaves a truncated store behind.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error(parent))?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Other(format!("Failed to serialize {}: {}", path.display(), e)))?;

    let tmp_path = temp_path(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_error(path)(source));
    }

    debug!(path = %path.display(), bytes = json.len(), "Wrote store");
    Ok(())
}

fn write_error(path: &Path) -> impl FnOnce(io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::StorageWrite { path, source }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
