//! Backup-before-overwrite.
//!
//! Before a save replaces the configuration file, its current bytes (the
//! previous ciphertext, not a re-encryption) are copied to a sibling named
//! `<file name>.backup`.  If the new write is interrupted or produces an
//! unreadable file, the backup holds the last known-good envelope.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use super::atomic_write::write_atomic;
use super::StorageError;

/// Suffix appended to the configuration file name to form the backup name.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Returns the backup path belonging to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Copies the full contents of `path` to its backup sibling.
///
/// Returns `Ok(None)` without touching the file system when `path` does not
/// exist.  The copy itself goes through [`write_atomic`], so an interrupted
/// backup never clobbers an older one with a partial file.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if the source exists but cannot be read, or
/// the backup cannot be written.
pub fn create_backup(path: &Path) -> Result<Option<PathBuf>, StorageError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let backup = backup_path(path);
    write_atomic(&backup, &bytes)?;
    info!(
        source = %path.display(),
        backup = %backup.display(),
        bytes = bytes.len(),
        "configuration backup written"
    );
    Ok(Some(backup))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
