//! Thread-safe handle to a [`ConfigurationStore`].
//!
//! The store itself is single-owner.  When several parts of the application
//! need it (a UI thread, a background network task), they share one
//! `SharedConfigurationStore`.  A single mutex guards both the in-memory
//! fields and the file on disk: two saves can never interleave their backup,
//! write and rename steps.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::configuration_store::{ConfigError, ConfigurationStore, LoadOutcome};

/// Cloneable, `Send + Sync` handle; clones refer to the same store.
#[derive(Clone)]
pub struct SharedConfigurationStore {
    inner: Arc<Mutex<ConfigurationStore>>,
}

impl SharedConfigurationStore {
    pub fn new(store: ConfigurationStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store for a sequence of operations.
    ///
    /// A panic while the lock was held does not make the store unusable:
    /// the guard is recovered and a warning is logged.
    pub fn lock(&self) -> MutexGuard<'_, ConfigurationStore> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("configuration store lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut ConfigurationStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn load_from_file(&self, path: &Path) -> Result<LoadOutcome, ConfigError> {
        self.lock().load_from_file(path)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.lock().save()
    }

    pub fn delete_file_if_exists(&self) -> Result<(), ConfigError> {
        self.lock().delete_file_if_exists()
    }
}

impl std::fmt::Debug for SharedConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConfigurationStore")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
