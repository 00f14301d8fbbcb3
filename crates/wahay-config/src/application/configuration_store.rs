//! The configuration store: state-gated load and save of the encrypted file.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! ConfigurationStore::new(key_manager, files)
//!   │
//!   ├─ init()                  required before any load or save
//!   ├─ detect_persistence()    is there a file at a well-known location?
//!   │     │
//!   │     ├─ yes ─► load_from_file(path)
//!   │     │           ├─ Loaded              settings replaced, after-load hooks run
//!   │     │           ├─ RetryWithNewSecret  wrong secret, ask again and retry
//!   │     │           └─ Err(..)             unreadable or malformed file
//!   │     │
//!   │     └─ no  ─► apply_defaults(), optionally enable_persistence()
//!   │
//!   ├─ settings_mut() / when_loaded() / when_saved()
//!   │
//!   └─ save()                  backup, derive key, encrypt, atomic write,
//!                              after-save hooks run
//! ```
//!
//! # Gates
//!
//! Every load and save first checks `initialized`, then `persistent_mode`.
//! A failed gate returns before any key derivation or file-system access, so
//! the store, the key manager and the disk are all left untouched.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use wahay_core::{
    generate_unique_id, open, parse_header, seal, ApplicationSettings, CodecError,
    EncryptionParameters, KdfParams, KeyError, KeyManager, PassphraseKeyManager,
};

use super::lifecycle_hooks::LifecycleHookQueue;
use crate::infrastructure::storage::fs::FsConfigFiles;
use crate::infrastructure::storage::{ConfigFiles, StorageError};

/// Callback run after a successful load, with the store it was registered on.
pub type AfterLoadHook = dyn FnOnce(&mut ConfigurationStore) + Send;

/// Callback run after a successful save.
pub type AfterSaveHook = dyn FnOnce() + Send;

/// Error type for configuration store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `load_from_file` or `save` was called before `init`.
    #[error("required configuration-init not executed")]
    NotInitialized,

    /// `save` was called while persistence is off.
    #[error("configuration persistence is not enabled")]
    PersistenceNotConfigured,

    /// The key manager could not produce a usable key for saving.
    #[error("no usable key is available to encrypt the configuration")]
    KeyUnavailable,

    /// The key manager refuses further attempts until its lockout is reset.
    #[error("configuration key manager is locked out after {failed_attempts} failed attempts")]
    LockedOut { failed_attempts: u32 },

    /// The key manager refused to cache verified key material.
    #[error("could not cache configuration key: {0}")]
    KeyCache(#[from] KeyError),

    /// Reading, writing, backing up or deleting the file failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The file is not a well-formed configuration envelope.
    #[error("configuration file is malformed: {0}")]
    Decode(#[source] CodecError),

    /// The settings could not be serialized or encrypted.
    #[error("could not encode configuration: {0}")]
    Encode(#[source] CodecError),
}

/// Result of [`ConfigurationStore::load_from_file`] when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Settings were replaced by the file's content and after-load hooks ran.
    Loaded,
    /// Persistence is off; nothing was read.
    NotPersistent,
    /// The key did not unlock the file.  The caller should obtain a new
    /// secret and call `load_from_file` again.  Once the key manager locks
    /// out, the next call returns [`ConfigError::LockedOut`] instead.
    RetryWithNewSecret,
}

impl LoadOutcome {
    /// `true` when the file could not be unlocked with the key produced.
    pub fn is_invalid(self) -> bool {
        matches!(self, LoadOutcome::RetryWithNewSecret)
    }

    /// `true` when the caller should retry the load.  Always equal to
    /// [`is_invalid`](Self::is_invalid).
    pub fn should_repeat(self) -> bool {
        self.is_invalid()
    }
}

/// Owner of the in-memory settings and of their encrypted file on disk.
pub struct ConfigurationStore {
    initialized: bool,
    persistent_mode: bool,
    filename: Option<PathBuf>,
    settings: ApplicationSettings,
    /// Parameters of the file last loaded or saved, reused by the next save.
    encryption: Option<EncryptionParameters>,
    kdf: KdfParams,
    after_load: LifecycleHookQueue<AfterLoadHook>,
    after_save: LifecycleHookQueue<AfterSaveHook>,
    key_manager: Box<dyn KeyManager>,
    files: Box<dyn ConfigFiles>,
}

impl ConfigurationStore {
    /// Creates an uninitialised, non-persistent store with zero-valued settings.
    pub fn new(key_manager: Box<dyn KeyManager>, files: Box<dyn ConfigFiles>) -> Self {
        Self {
            initialized: false,
            persistent_mode: false,
            filename: None,
            settings: ApplicationSettings::default(),
            encryption: None,
            kdf: KdfParams::RECOMMENDED,
            after_load: LifecycleHookQueue::new(),
            after_save: LifecycleHookQueue::new(),
            key_manager,
            files,
        }
    }

    /// Creates a store that uses the platform's well-known file locations.
    pub fn on_disk(key_manager: PassphraseKeyManager) -> Self {
        Self::new(Box::new(key_manager), Box::new(FsConfigFiles::new()))
    }

    /// Sets the derivation cost used when a file is written for the first time.
    /// Existing files keep the cost recorded in their header.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    // ── State ─────────────────────────────────────────────────────────────────

    /// Marks the store ready for load and save.  Calling it again has no effect.
    pub fn init(&mut self) {
        if !self.initialized {
            debug!("configuration store initialised");
        }
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent_mode
    }

    /// Path of the persisted file, if one was detected or chosen.
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn settings(&self) -> &ApplicationSettings {
        &self.settings
    }

    /// Mutable access to the settings.
    ///
    /// An already assigned unique configuration identifier survives any
    /// change made through the returned guard.
    pub fn settings_mut(&mut self) -> SettingsMut<'_> {
        let unique_id = self.settings.unique_configuration_id.clone();
        SettingsMut {
            settings: &mut self.settings,
            unique_id,
        }
    }

    /// Resets every preference to its baseline, keeping the unique identifier.
    pub fn apply_defaults(&mut self) {
        self.settings.apply_defaults();
    }

    // ── Persistence mode ──────────────────────────────────────────────────────

    /// Looks for an existing configuration file at the well-known locations.
    ///
    /// Switches persistence on and records the path when one is found;
    /// switches it off otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Storage`] if a location cannot be inspected.
    pub fn detect_persistence(&mut self) -> Result<Option<PathBuf>, ConfigError> {
        match self.files.locate()? {
            Some(path) => {
                info!(path = %path.display(), "persisted configuration detected");
                self.persistent_mode = true;
                self.filename = Some(path.clone());
                Ok(Some(path))
            }
            None => {
                info!("no persisted configuration found");
                self.persistent_mode = false;
                Ok(None)
            }
        }
    }

    /// Opts in to persistence, writing to `path` or to the primary default
    /// location.  Nothing is written until the next [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Storage`] if no default location exists.
    pub fn enable_persistence(&mut self, path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(path) => path,
            None => self.files.default_path()?,
        };
        info!(path = %path.display(), "configuration persistence enabled");
        self.persistent_mode = true;
        self.filename = Some(path.clone());
        Ok(path)
    }

    /// Opts out of persistence: removes the file and its backup and drops any
    /// cached key material.  The in-memory settings are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Storage`] if a file exists but cannot be removed.
    /// Persistence is already off at that point.
    pub fn disable_persistence(&mut self) -> Result<(), ConfigError> {
        self.persistent_mode = false;
        self.encryption = None;
        self.key_manager.invalidate();
        if let Some(path) = self.filename.take() {
            self.files.delete_if_exists(&path)?;
            self.files.delete_backup_if_exists(&path)?;
            info!(path = %path.display(), "configuration persistence disabled");
        }
        Ok(())
    }

    // ── Identity ──────────────────────────────────────────────────────────────

    /// Returns the unique configuration identifier, generating it on first use.
    pub fn unique_id(&mut self) -> &str {
        if self.settings.unique_configuration_id.is_empty() {
            self.settings.unique_configuration_id = generate_unique_id();
            debug!("unique configuration id generated");
        }
        &self.settings.unique_configuration_id
    }

    /// Makes sure everything that must be on disk is populated.
    pub fn prepare_for_save(&mut self) {
        self.unique_id();
    }

    // ── Load / save ───────────────────────────────────────────────────────────

    /// Decrypts the file at `path` and replaces the in-memory settings.
    ///
    /// A wrong secret is not an error: it yields
    /// [`LoadOutcome::RetryWithNewSecret`], the key manager is told through
    /// `last_attempt_failed`, and the settings stay as they were.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotInitialized`] before [`init`](Self::init).
    /// - [`ConfigError::LockedOut`] once the key manager stops accepting
    ///   attempts.  Nothing is derived and the failure counter is unchanged.
    /// - [`ConfigError::Storage`] if the file cannot be read.
    /// - [`ConfigError::Decode`] if the file is structurally broken or its
    ///   decrypted content is not valid settings.
    /// - [`ConfigError::KeyCache`] if the verified key cannot be cached.
    pub fn load_from_file(&mut self, path: &Path) -> Result<LoadOutcome, ConfigError> {
        if !self.initialized {
            return Err(ConfigError::NotInitialized);
        }
        if !self.persistent_mode {
            debug!("persistence disabled, skipping load");
            return Ok(LoadOutcome::NotPersistent);
        }

        let bytes = self.files.read(path)?;
        let (params, _) = parse_header(&bytes).map_err(ConfigError::Decode)?;
        self.ensure_not_locked_out()?;

        let result = self.key_manager.generate_key(&params);
        if !result.valid {
            warn!(path = %path.display(), "configuration key did not verify");
            self.key_manager.last_attempt_failed();
            return Ok(LoadOutcome::RetryWithNewSecret);
        }

        let settings = match open(&bytes, &result.key) {
            Ok(settings) => settings,
            Err(CodecError::AuthenticationFailed) => {
                warn!(path = %path.display(), "configuration ciphertext failed authentication");
                self.key_manager.last_attempt_failed();
                return Ok(LoadOutcome::RetryWithNewSecret);
            }
            Err(e) => return Err(ConfigError::Decode(e)),
        };

        self.key_manager.cache_from_result(&result)?;
        self.settings = settings;
        self.encryption = Some(params);
        self.filename = Some(path.to_path_buf());
        info!(path = %path.display(), "configuration loaded");

        self.run_after_load();
        Ok(LoadOutcome::Loaded)
    }

    /// Encrypts the settings and replaces the persisted file.
    ///
    /// The previous file, if any, is copied to its backup first.  The salt of
    /// the last loaded or saved file is reused with a fresh nonce, so a key
    /// cached by the key manager stays valid across saves.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotInitialized`] before [`init`](Self::init).
    /// - [`ConfigError::PersistenceNotConfigured`] while persistence is off.
    /// - [`ConfigError::LockedOut`] while the key manager is locked out.
    /// - [`ConfigError::KeyUnavailable`] if the key manager yields no usable key.
    /// - [`ConfigError::Storage`], [`ConfigError::Encode`] or
    ///   [`ConfigError::KeyCache`] from the individual steps.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        if !self.initialized {
            return Err(ConfigError::NotInitialized);
        }
        if !self.persistent_mode {
            return Err(ConfigError::PersistenceNotConfigured);
        }

        let path = match &self.filename {
            Some(path) => path.clone(),
            None => {
                let path = self.files.default_path()?;
                self.filename = Some(path.clone());
                path
            }
        };

        self.ensure_not_locked_out()?;
        self.prepare_for_save();
        self.files.create_backup(&path)?;

        let mut params = match self.encryption.clone() {
            Some(mut params) => {
                params.refresh_nonce();
                params
            }
            None => EncryptionParameters::generate(self.kdf),
        };

        let result = self.key_manager.generate_key(&params);
        if !result.valid {
            warn!(path = %path.display(), "no usable key to save configuration");
            return Err(ConfigError::KeyUnavailable);
        }
        self.key_manager.cache_from_result(&result)?;

        let bytes = seal(&self.settings, &params, &result).map_err(ConfigError::Encode)?;
        self.files.write_atomic(&path, &bytes)?;

        params.mac = Some(result.mac);
        self.encryption = Some(params);
        info!(path = %path.display(), bytes = bytes.len(), "configuration saved");

        self.run_after_save();
        Ok(())
    }

    /// Removes the persisted file.  A missing file, or no file name at all,
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Storage`] if the file exists but cannot be removed.
    pub fn delete_file_if_exists(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.filename {
            self.files.delete_if_exists(path)?;
        }
        Ok(())
    }

    // ── Key manager state ─────────────────────────────────────────────────────

    /// `true` while the key manager refuses further unlock attempts.
    pub fn is_key_locked_out(&self) -> bool {
        self.key_manager.is_locked_out()
    }

    /// Consecutive failed unlock attempts recorded by the key manager.
    pub fn failed_unlock_attempts(&self) -> u32 {
        self.key_manager.failed_attempts()
    }

    /// Lets the key manager accept attempts again.
    pub fn reset_key_lockout(&mut self) {
        self.key_manager.reset_lockout();
        info!("configuration key lockout reset");
    }

    fn ensure_not_locked_out(&self) -> Result<(), ConfigError> {
        if self.key_manager.is_locked_out() {
            let failed_attempts = self.key_manager.failed_attempts();
            warn!(failed_attempts, "configuration key manager is locked out");
            return Err(ConfigError::LockedOut { failed_attempts });
        }
        Ok(())
    }

    // ── Hooks ─────────────────────────────────────────────────────────────────

    /// Registers `hook` to run once after the next successful load.
    pub fn when_loaded(&mut self, hook: impl FnOnce(&mut ConfigurationStore) + Send + 'static) {
        self.after_load.push(Box::new(hook));
    }

    /// Registers `hook` to run once after the next successful save.
    pub fn when_saved(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.after_save.push(Box::new(hook));
    }

    fn run_after_load(&mut self) {
        let hooks = self.after_load.take();
        if !hooks.is_empty() {
            debug!(count = hooks.len(), "running after-load hooks");
        }
        for hook in hooks {
            hook(self);
        }
    }

    fn run_after_save(&mut self) {
        let hooks = self.after_save.take();
        if !hooks.is_empty() {
            debug!(count = hooks.len(), "running after-save hooks");
        }
        for hook in hooks {
            hook();
        }
    }
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("initialized", &self.initialized)
            .field("persistent_mode", &self.persistent_mode)
            .field("filename", &self.filename)
            .field("after_load", &self.after_load)
            .field("after_save", &self.after_save)
            .finish_non_exhaustive()
    }
}

/// Write guard returned by [`ConfigurationStore::settings_mut`].
///
/// Restores a non-empty unique configuration identifier when dropped.
pub struct SettingsMut<'a> {
    settings: &'a mut ApplicationSettings,
    unique_id: String,
}

impl Deref for SettingsMut<'_> {
    type Target = ApplicationSettings;

    fn deref(&self) -> &ApplicationSettings {
        self.settings
    }
}

impl DerefMut for SettingsMut<'_> {
    fn deref_mut(&mut self) -> &mut ApplicationSettings {
        self.settings
    }
}

impl Drop for SettingsMut<'_> {
    fn drop(&mut self) {
        if !self.unique_id.is_empty() {
            self.settings.unique_configuration_id = std::mem::take(&mut self.unique_id);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
