//! Infrastructure layer for the configuration subsystem.
//!
//! Contains OS-facing adapters: well-known file locations, backups, atomic
//! writes, and deletion of the persisted configuration file.

pub mod storage;
