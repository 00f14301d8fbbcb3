//! Crash-safe file replacement.
//!
//! ```text
//! write  <dir>/.config.wahay.<pid>.tmp   (mode 0600 on unix)
//! fsync  the temp file
//! rename temp → config.wahay             (atomic on the same file system)
//! fsync  <dir>                           (unix, best effort)
//! ```
//!
//! A crash before the rename leaves the previous file untouched; a crash
//! after it leaves the new one.  The temp file lives in the destination
//! directory because `rename` is only atomic within one file system.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::StorageError;

/// Atomically replaces `path` with `bytes`, creating parent directories.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if any step fails.  The destination is then
/// left exactly as it was and the temp file is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

    let tmp_path = temp_path_for(path);
    if let Err(e) = write_and_sync(&tmp_path, bytes) {
        remove_quietly(&tmp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        remove_quietly(&tmp_path);
        return Err(StorageError::io(path, e));
    }

    sync_dir(&dir);
    debug!(path = %path.display(), bytes = bytes.len(), "file replaced atomically");
    Ok(())
}

/// Removes `path`.  A file that is already gone is not an error.
pub fn delete_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "file removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn write_and_sync(tmp_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = open_private(tmp_path).map_err(|e| StorageError::io(tmp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| StorageError::io(tmp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(tmp_path, e))
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), "could not sync directory after rename: {e}");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "could not remove temp file: {e}");
        }
    }
}

/// Directory containing `path`; `.` for a bare file name.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    parent_dir(path).join(format!(".{name}.{}.tmp", std::process::id()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
