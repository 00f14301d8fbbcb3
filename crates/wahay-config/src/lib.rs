//! wahay-config library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::configuration_store::{
    ConfigError, ConfigurationStore, LoadOutcome, SettingsMut,
};
pub use application::lifecycle_hooks::LifecycleHookQueue;
pub use application::shared_store::SharedConfigurationStore;
pub use infrastructure::storage::{fs::FsConfigFiles, ConfigFiles, StorageError};
