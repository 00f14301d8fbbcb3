//! The key management contract consumed by the configuration store.
//!
//! # Flow (for beginners)
//!
//! ```text
//! persisted header ──► EncryptionParameters ──► KeyManager::generate_key
//!                                                      │
//!                                              EncryptionResult { key, mac, valid }
//!                                                      │
//!                         valid ──► decrypt with key, then cache_from_result
//!                         !valid ──► last_attempt_failed, ask the user again
//! ```
//!
//! `mac` is a 32-byte verifier derived alongside the key.  The file header
//! stores the verifier of the key that wrote it, so a wrong secret is caught
//! by comparing verifiers before any decryption is attempted.

use rand::RngCore;
use zeroize::Zeroizing;

/// Length in bytes of the symmetric encryption key.
pub const KEY_LEN: usize = 32;
/// Length in bytes of the key verifier.
pub const MAC_LEN: usize = 32;
/// Length in bytes of the key-derivation salt.
pub const SALT_LEN: usize = 16;
/// Length in bytes of the XChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 24;

/// Cost parameters for the memory-hard key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl KdfParams {
    /// 64 MiB, 3 passes, 4 lanes.
    pub const RECOMMENDED: KdfParams = KdfParams {
        memory_kib: 65536,
        iterations: 3,
        parallelism: 4,
    };

    /// Largest memory cost accepted from a file header (1 GiB).
    pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;
    /// Largest number of passes accepted from a file header.
    pub const MAX_ITERATIONS: u32 = 16;
    /// Largest number of lanes accepted from a file header.
    pub const MAX_PARALLELISM: u32 = 16;

    /// `true` if the cost is within the accepted range.
    ///
    /// The cost is read from the file before anything is authenticated, so a
    /// corrupted header must not be able to demand unbounded memory or time.
    /// The lower bounds are Argon2's own: at least one pass, at least one
    /// lane, and 8 KiB of memory per lane.
    pub fn is_supported(&self) -> bool {
        (1..=Self::MAX_PARALLELISM).contains(&self.parallelism)
            && (1..=Self::MAX_ITERATIONS).contains(&self.iterations)
            && self.memory_kib <= Self::MAX_MEMORY_KIB
            && self.memory_kib >= 8 * self.parallelism
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// Input to key derivation, extracted from a persisted file header or
/// freshly generated before the first save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParameters {
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Verifier of the key that wrote the file.  `None` for fresh parameters.
    pub mac: Option<[u8; MAC_LEN]>,
}

impl EncryptionParameters {
    /// Creates parameters for a file that does not exist yet: random salt,
    /// random nonce, no stored verifier.
    pub fn generate(kdf: KdfParams) -> Self {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);
        Self {
            kdf,
            salt,
            nonce,
            mac: None,
        }
    }

    /// Replaces the nonce with a fresh random one.
    ///
    /// Every encryption under the same key must use a new nonce; the salt
    /// (and therefore the key) stays the same across saves.
    pub fn refresh_nonce(&mut self) {
        rand::thread_rng().fill_bytes(&mut self.nonce);
    }
}

/// Key material produced by a [`KeyManager`].
#[derive(Clone)]
pub struct EncryptionResult {
    pub key: Zeroizing<[u8; KEY_LEN]>,
    pub mac: [u8; MAC_LEN],
    /// `true` when the derived verifier matches the stored one (or there was
    /// nothing stored to compare against).  `false` signals a wrong secret or
    /// a secret that could not be obtained.
    pub valid: bool,
}

impl EncryptionResult {
    /// A result carrying no usable key material.
    pub fn rejected() -> Self {
        Self {
            key: Zeroizing::new([0u8; KEY_LEN]),
            mac: [0u8; MAC_LEN],
            valid: false,
        }
    }
}

impl std::fmt::Debug for EncryptionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionResult")
            .field("key", &"<redacted>")
            .field("mac", &hex::encode(self.mac))
            .field("valid", &self.valid)
            .finish()
    }
}

/// Errors reported by a [`KeyManager`].
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The derivation function rejected its parameters or failed internally.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// `cache_from_result` was given material the manager never derived.
    #[error("no derivation matches the key material to cache")]
    MissingMaterial,

    /// `cache_from_result` was given material that failed verification.
    #[error("refusing to cache key material that failed verification")]
    Unverified,
}

/// Turns encryption parameters into key material.
///
/// Implementations own the derivation algorithm, any session cache, and any
/// attempt-counting policy.  The store only asks whether the manager is
/// locked out, so that it can stop a caller's retry loop.
pub trait KeyManager: Send {
    /// Produces key material for `params`, possibly from a cache.
    fn generate_key(&mut self, params: &EncryptionParameters) -> EncryptionResult;

    /// Remembers verified key material for reuse within the session.
    fn cache_from_result(&mut self, result: &EncryptionResult) -> Result<(), KeyError>;

    /// Drops any cached key material.
    fn invalidate(&mut self);

    /// Records that the last key produced did not unlock the file.
    fn last_attempt_failed(&mut self);

    /// Consecutive failed unlock attempts since the last success.
    fn failed_attempts(&self) -> u32;

    /// `true` while the manager refuses to make further attempts.  A locked
    /// out manager returns rejected results from `generate_key` without
    /// trying a secret.
    fn is_locked_out(&self) -> bool;

    /// Clears the failure counter, e.g. after an out-of-band identity check.
    fn reset_lockout(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_fresh_salt_and_nonce() {
        let a = EncryptionParameters::generate(KdfParams::RECOMMENDED);
        let b = EncryptionParameters::generate(KdfParams::RECOMMENDED);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert!(a.mac.is_none());
    }

    #[test]
    fn test_refresh_nonce_keeps_salt() {
        // Arrange
        let mut params = EncryptionParameters::generate(KdfParams::default());
        let salt = params.salt;
        let nonce = params.nonce;

        // Act
        params.refresh_nonce();

        // Assert
        assert_eq!(params.salt, salt);
        assert_ne!(params.nonce, nonce);
    }

    #[test]
    fn test_recommended_cost_is_supported() {
        assert!(KdfParams::RECOMMENDED.is_supported());
    }

    #[test]
    fn test_cost_outside_bounds_is_unsupported() {
        let base = KdfParams::RECOMMENDED;
        let cases = [
            KdfParams { memory_kib: KdfParams::MAX_MEMORY_KIB + 1, ..base },
            KdfParams { memory_kib: 0x4000_0000, ..base },
            KdfParams { iterations: 0, ..base },
            KdfParams { iterations: KdfParams::MAX_ITERATIONS + 1, ..base },
            KdfParams { parallelism: 0, ..base },
            KdfParams { parallelism: KdfParams::MAX_PARALLELISM + 1, ..base },
            KdfParams { memory_kib: 16, parallelism: 4, iterations: 1 },
        ];
        for kdf in cases {
            assert!(!kdf.is_supported(), "{kdf:?} must be rejected");
        }
    }

    #[test]
    fn test_rejected_result_is_invalid() {
        let result = EncryptionResult::rejected();
        assert!(!result.valid);
        assert_eq!(*result.key, [0u8; KEY_LEN]);
    }

    #[test]
    fn test_debug_output_redacts_key() {
        let result = EncryptionResult {
            key: Zeroizing::new([0xAB; KEY_LEN]),
            mac: [0x01; MAC_LEN],
            valid: true,
        };
        let rendered = format!("{result:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&"ab".repeat(KEY_LEN)));
    }
}
