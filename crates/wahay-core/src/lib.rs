//! # wahay-core
//!
//! Pure building blocks for Wahay's encrypted configuration file: the
//! settings model, the key management contract, and the envelope codec that
//! turns settings into authenticated ciphertext and back.
//!
//! This crate performs no file-system access.  The `wahay-config` crate owns
//! the on-disk lifecycle (detection, backups, atomic writes) and drives the
//! pieces defined here.
//!
//! # Architecture overview (for beginners)
//!
//! Wahay stores preferences such as binary paths, the voice server port, and
//! a per-installation identifier.  Those values must stay private if the disk
//! is stolen, so the file is encrypted with a key derived from a user secret.
//!
//! - **`domain`** – The `ApplicationSettings` struct and the unique
//!   configuration identifier.  Plain data with serde derives.
//!
//! - **`crypto`** – The `KeyManager` trait (the seam where a user secret
//!   becomes key material) and `PassphraseKeyManager`, an Argon2id
//!   implementation with a session cache and a failed-attempt counter.
//!
//! - **`envelope`** – The byte layout of the persisted file: a fixed header
//!   carrying the derivation parameters, followed by XChaCha20-Poly1305
//!   ciphertext of the TOML-encoded settings.

pub mod crypto;
pub mod domain;
pub mod envelope;

pub use crypto::keys::{
    EncryptionParameters, EncryptionResult, KdfParams, KeyError, KeyManager, KEY_LEN, MAC_LEN,
    NONCE_LEN, SALT_LEN,
};
pub use crypto::passphrase::{PassphraseKeyManager, SecretPrompt};
pub use domain::settings::ApplicationSettings;
pub use domain::unique_id::generate_unique_id;
pub use envelope::codec::{open, parse_header, seal, CodecError};
