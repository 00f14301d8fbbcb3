//! Key management for the encrypted configuration file.
//!
//! - **`keys`**       – The [`keys::KeyManager`] contract and the value types
//!   that cross it.  The configuration store only ever talks to this trait.
//! - **`passphrase`** – [`passphrase::PassphraseKeyManager`], the production
//!   implementation: Argon2id derivation from a user passphrase, a session
//!   cache, and a failed-attempt counter for lockout.
//!
//! # Testability
//!
//! Because the store receives a `Box<dyn KeyManager>`, tests substitute a
//! `mockall` double and never pay for a real key derivation.

pub mod keys;
pub mod passphrase;
