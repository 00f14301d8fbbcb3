//! Well-known locations of the encrypted configuration file.
//!
//! Searched in order:
//! - Windows:  `%APPDATA%\Wahay\config.wahay`
//! - Linux:    `$XDG_CONFIG_HOME/wahay/config.wahay` (or `~/.config/wahay/`)
//! - macOS:    `~/Library/Application Support/Wahay/config.wahay`
//! - Legacy (all platforms with a home directory): `~/.wahay/config.wahay`
//!
//! The first entry is also where a new file is created on first save.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::StorageError;

/// File name of the encrypted configuration file.
pub const CONFIG_FILE_NAME: &str = "config.wahay";

/// Name of the per-user dot directory used by early releases.
const LEGACY_DIR_NAME: &str = ".wahay";

/// Returns the well-known file paths in search order.
pub fn default_search_paths() -> Vec<PathBuf> {
    platform_config_dir()
        .into_iter()
        .chain(legacy_config_dir())
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .collect()
}

/// Returns the first of `candidates` that exists as a regular file.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if a candidate cannot be inspected for a
/// reason other than "not found" (e.g. permission denied on the directory).
pub fn find_existing(candidates: &[PathBuf]) -> Result<Option<PathBuf>, StorageError> {
    for candidate in candidates {
        if is_existing_file(candidate)? {
            debug!(path = %candidate.display(), "configuration file located");
            return Ok(Some(candidate.clone()));
        }
    }
    Ok(None)
}

fn is_existing_file(path: &Path) -> Result<bool, StorageError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Resolves the platform config directory including the `Wahay` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Wahay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")))?;
        Some(base.join("wahay"))
    }

    #[cfg(target_os = "macos")]
    {
        home_dir().map(|h| h.join("Library").join("Application Support").join("Wahay"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

fn legacy_config_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(LEGACY_DIR_NAME))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
