//! Storage infrastructure: the persisted configuration file on disk.
//!
//! The configuration store never touches `std::fs` directly.  It talks to
//! the [`ConfigFiles`] port, which this module defines and [`fs::FsConfigFiles`]
//! implements:
//!
//! - **`locations`**    – Well-known places where a configuration file may live.
//! - **`backup`**       – Byte-for-byte copy of the current file before it is overwritten.
//! - **`atomic_write`** – Temp file, durable flush, rename.
//! - **`fs`**           – The production adapter tying the above together.
//!
//! # Testability
//!
//! Because the store holds a `Box<dyn ConfigFiles>`, unit tests can assert
//! that an operation performs *no* file-system write at all by injecting a
//! mock whose write expectations are set to `never()`.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod atomic_write;
pub mod backup;
pub mod fs;
pub mod locations;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Port through which the configuration store reaches the file system.
pub trait ConfigFiles: Send {
    /// Returns the first existing configuration file among the well-known
    /// locations, or `None` if there is none.
    fn locate(&self) -> Result<Option<PathBuf>, StorageError>;

    /// Where a new configuration file is created when none was located.
    fn default_path(&self) -> Result<PathBuf, StorageError>;

    /// Reads the whole file.
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Copies `path` aside before it is overwritten.  Returns the backup path,
    /// or `None` when there was nothing to back up.
    fn create_backup(&self, path: &Path) -> Result<Option<PathBuf>, StorageError>;

    /// Replaces `path` with `bytes` so that readers see either the old or the
    /// new content, never a mixture.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Removes `path`.  A missing file is not an error.
    fn delete_if_exists(&self, path: &Path) -> Result<(), StorageError>;

    /// Removes the backup belonging to `path`.  A missing backup is not an error.
    fn delete_backup_if_exists(&self, path: &Path) -> Result<(), StorageError>;
}
