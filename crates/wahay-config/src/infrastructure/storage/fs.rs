//! Production [`ConfigFiles`] adapter backed by `std::fs`.

use std::path::{Path, PathBuf};

use tracing::info;

use super::atomic_write::{delete_if_exists, write_atomic};
use super::backup::{backup_path, create_backup};
use super::locations::{default_search_paths, find_existing};
use super::{ConfigFiles, StorageError};

/// Reads and writes the configuration file on the local file system.
#[derive(Debug, Clone)]
pub struct FsConfigFiles {
    search_paths: Vec<PathBuf>,
}

impl FsConfigFiles {
    /// Uses the platform's well-known locations.
    pub fn new() -> Self {
        Self::with_search_paths(default_search_paths())
    }

    /// Uses `search_paths` instead of the platform locations.  The first entry
    /// is where a new file is created.
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }
}

impl Default for FsConfigFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFiles for FsConfigFiles {
    fn locate(&self) -> Result<Option<PathBuf>, StorageError> {
        find_existing(&self.search_paths)
    }

    fn default_path(&self) -> Result<PathBuf, StorageError> {
        self.search_paths
            .first()
            .cloned()
            .ok_or(StorageError::NoPlatformConfigDir)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        std::fs::read(path).map_err(|e| StorageError::io(path, e))
    }

    fn create_backup(&self, path: &Path) -> Result<Option<PathBuf>, StorageError> {
        create_backup(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        write_atomic(path, bytes)
    }

    fn delete_if_exists(&self, path: &Path) -> Result<(), StorageError> {
        delete_if_exists(path)
    }

    fn delete_backup_if_exists(&self, path: &Path) -> Result<(), StorageError> {
        let backup = backup_path(path);
        delete_if_exists(&backup)?;
        info!(path = %backup.display(), "configuration backup removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wahay_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_path_is_first_search_path() {
        let files = FsConfigFiles::with_search_paths(vec![
            PathBuf::from("/a/config.wahay"),
            PathBuf::from("/b/config.wahay"),
        ]);
        assert_eq!(files.default_path().unwrap(), PathBuf::from("/a/config.wahay"));
    }

    #[test]
    fn test_default_path_without_search_paths_is_an_error() {
        let files = FsConfigFiles::with_search_paths(Vec::new());
        assert!(matches!(
            files.default_path(),
            Err(StorageError::NoPlatformConfigDir)
        ));
    }

    #[test]
    fn test_locate_finds_legacy_location_when_primary_absent() {
        // Arrange
        let dir = temp_dir();
        let primary = dir.join("primary").join("config.wahay");
        let legacy = dir.join("legacy").join("config.wahay");
        std::fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        std::fs::write(&legacy, b"x").unwrap();
        let files = FsConfigFiles::with_search_paths(vec![primary, legacy.clone()]);

        // Act
        let found = files.locate().unwrap();

        // Assert
        assert_eq!(found, Some(legacy));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_delete_backup_if_exists_removes_backup_only() {
        let dir = temp_dir();
        let path = dir.join("config.wahay");
        std::fs::write(&path, b"live").unwrap();
        std::fs::write(backup_path(&path), b"old").unwrap();
        let files = FsConfigFiles::with_search_paths(vec![path.clone()]);

        files.delete_backup_if_exists(&path).unwrap();
        files.delete_backup_if_exists(&path).unwrap();

        assert!(path.exists());
        assert!(!backup_path(&path).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_missing_file_reports_path() {
        let dir = temp_dir();
        let path = dir.join("absent.wahay");
        let files = FsConfigFiles::with_search_paths(vec![path.clone()]);

        let err = files.read(&path).unwrap_err();

        assert!(err.to_string().contains("absent.wahay"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
