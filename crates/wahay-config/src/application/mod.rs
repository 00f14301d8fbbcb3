//! Application layer for the configuration subsystem.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer orchestrates the pure pieces from `wahay_core`
//! (settings, key management, envelope codec) through the storage port
//! defined in `infrastructure::storage`, to fulfil user goals such as "unlock
//! my saved preferences" or "remember these preferences across restarts".
//! It depends on traits rather than concrete adapters, so tests can swap
//! the key manager and the file system for doubles.
//!
//! # Sub-modules
//!
//! - **`configuration_store`** – The state machine that gates load/save on
//!   initialization and persistence mode, and sequences backup, key
//!   derivation, encryption and the atomic write.
//!
//! - **`lifecycle_hooks`** – Run-once callback queues drained after a
//!   successful load or save.
//!
//! - **`shared_store`** – A cloneable handle that serializes every store
//!   operation behind one mutex for multi-caller use.

pub mod configuration_store;
pub mod lifecycle_hooks;
pub mod shared_store;
