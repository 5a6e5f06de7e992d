use crate::error::{PlannerError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers see either the old or the new document, never a partial one.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as 2-space indented JSON with a trailing newline and
/// write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    atomic_write(path, data.as_bytes())
}

/// Read and deserialize a JSON document. Returns `Ok(None)` when the file
/// does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|e| PlannerError::from_load(path, e))
}

/// Run `f` while holding an exclusive advisory lock on `lock_path`.
///
/// The lock file is created when missing and is never renamed or replaced,
/// so every process contends on the same inode even while the data file
/// next to it is swapped by [`atomic_write`]. Acquisition blocks with no
/// timeout. The lock is released when the handle drops, which the OS also
/// does on process exit.
pub fn with_exclusive_lock<T>(lock_path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    file.lock()?;
    tracing::debug!(lock = %lock_path.display(), "lock acquired");
    let result = f();
    drop(file);
    tracing::debug!(lock = %lock_path.display(), "lock released");
    result
}
