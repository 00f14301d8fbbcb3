//! Argon2id key manager driven by a user passphrase.
//!
//! One Argon2id run produces 64 bytes: the first 32 are the encryption key,
//! the last 32 are the verifier (`mac`) written into the file header.  A
//! wrong passphrase yields a different verifier, which is detected in
//! constant time before decryption is attempted.
//!
//! # Session cache
//!
//! Deriving with the recommended cost takes a noticeable fraction of a
//! second and 64 MiB of memory.  After a successful load the store calls
//! [`KeyManager::cache_from_result`]; later saves under the same salt reuse
//! the cached key without asking for the passphrase again.
//!
//! # Lockout
//!
//! Each [`KeyManager::last_attempt_failed`] call bumps a counter and drops the
//! cache.  Once the counter reaches the configured maximum the manager stops
//! prompting and returns rejected results until [`KeyManager::reset_lockout`].

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::keys::{
    EncryptionParameters, EncryptionResult, KdfParams, KeyError, KeyManager, KEY_LEN, MAC_LEN,
    SALT_LEN,
};

/// Default number of consecutive failures before the manager locks out.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Supplies the passphrase on demand.
///
/// The argument is the number of failed attempts so far, so a UI can say
/// "wrong passphrase, try again".  Returning `None` means the user declined.
pub type SecretPrompt = Box<dyn FnMut(u32) -> Option<Zeroizing<String>> + Send>;

/// Identity of a derivation: same salt and cost means same key for the same passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DerivationInput {
    salt: [u8; SALT_LEN],
    kdf: KdfParams,
}

impl From<&EncryptionParameters> for DerivationInput {
    fn from(params: &EncryptionParameters) -> Self {
        Self {
            salt: params.salt,
            kdf: params.kdf,
        }
    }
}

struct CachedKey {
    input: DerivationInput,
    key: Zeroizing<[u8; KEY_LEN]>,
    mac: [u8; MAC_LEN],
}

/// Production [`KeyManager`]: Argon2id over a prompted passphrase.
pub struct PassphraseKeyManager {
    prompt: SecretPrompt,
    cache: Option<CachedKey>,
    last_input: Option<DerivationInput>,
    failed_attempts: u32,
    max_failed_attempts: u32,
}

impl PassphraseKeyManager {
    /// Creates a manager that asks `prompt` whenever it has no cached key.
    pub fn new(prompt: SecretPrompt) -> Self {
        Self {
            prompt,
            cache: None,
            last_input: None,
            failed_attempts: 0,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
        }
    }

    /// Sets the number of consecutive failures tolerated before lockout.
    pub fn with_max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    /// `true` if a verified key is cached for the session.
    pub fn has_cached_key(&self) -> bool {
        self.cache.is_some()
    }

    fn verify(params: &EncryptionParameters, mac: &[u8; MAC_LEN]) -> bool {
        match params.mac {
            Some(stored) => bool::from(stored[..].ct_eq(&mac[..])),
            None => true,
        }
    }
}

/// Runs Argon2id over `secret` and splits the 64-byte output into key and verifier.
///
/// # Errors
///
/// Returns [`KeyError::Derivation`] if the cost parameters are out of range.
pub fn derive_key_material(
    secret: &str,
    params: &EncryptionParameters,
) -> Result<(Zeroizing<[u8; KEY_LEN]>, [u8; MAC_LEN]), KeyError> {
    if !params.kdf.is_supported() {
        return Err(KeyError::Derivation(format!(
            "unsupported Argon2 cost: {:?}",
            params.kdf
        )));
    }
    let argon_params = Params::new(
        params.kdf.memory_kib,
        params.kdf.iterations,
        params.kdf.parallelism,
        Some(KEY_LEN + MAC_LEN),
    )
    .map_err(|e| KeyError::Derivation(format!("invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = [0u8; KEY_LEN + MAC_LEN];
    argon2
        .hash_password_into(secret.as_bytes(), &params.salt, &mut output)
        .map_err(|e| KeyError::Derivation(e.to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&output[..KEY_LEN]);
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&output[KEY_LEN..]);
    output.zeroize();

    Ok((key, mac))
}

impl KeyManager for PassphraseKeyManager {
    fn generate_key(&mut self, params: &EncryptionParameters) -> EncryptionResult {
        let input = DerivationInput::from(params);
        self.last_input = Some(input);

        if let Some(cached) = self.cache.as_ref().filter(|c| c.input == input) {
            debug!("serving configuration key from session cache");
            return EncryptionResult {
                key: cached.key.clone(),
                mac: cached.mac,
                valid: Self::verify(params, &cached.mac),
            };
        }

        if self.is_locked_out() {
            warn!(
                failed_attempts = self.failed_attempts,
                "configuration key manager is locked out"
            );
            return EncryptionResult::rejected();
        }

        let Some(secret) = (self.prompt)(self.failed_attempts) else {
            debug!("no passphrase supplied");
            return EncryptionResult::rejected();
        };

        match derive_key_material(&secret, params) {
            Ok((key, mac)) => {
                let valid = Self::verify(params, &mac);
                EncryptionResult { key, mac, valid }
            }
            Err(e) => {
                warn!("configuration key derivation failed: {e}");
                EncryptionResult::rejected()
            }
        }
    }

    fn cache_from_result(&mut self, result: &EncryptionResult) -> Result<(), KeyError> {
        if !result.valid {
            return Err(KeyError::Unverified);
        }
        let input = self.last_input.ok_or(KeyError::MissingMaterial)?;
        self.cache = Some(CachedKey {
            input,
            key: result.key.clone(),
            mac: result.mac,
        });
        self.failed_attempts = 0;
        Ok(())
    }

    fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            debug!("cached configuration key dropped");
        }
    }

    fn last_attempt_failed(&mut self) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.invalidate();
        warn!(
            failed_attempts = self.failed_attempts,
            max = self.max_failed_attempts,
            "configuration unlock attempt failed"
        );
    }

    fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    fn is_locked_out(&self) -> bool {
        self.failed_attempts >= self.max_failed_attempts
    }

    fn reset_lockout(&mut self) {
        self.failed_attempts = 0;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Cheap cost profile so tests do not allocate 64 MiB per derivation.
    const TEST_KDF: KdfParams = KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };

    fn prompt_with(secret: &'static str, calls: Arc<AtomicU32>) -> SecretPrompt {
        Box::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(Zeroizing::new(secret.to_string()))
        })
    }

    fn params_for(secret: &str) -> EncryptionParameters {
        let mut params = EncryptionParameters::generate(TEST_KDF);
        let (_, mac) = derive_key_material(secret, &params).expect("derive");
        params.mac = Some(mac);
        params
    }

    #[test]
    fn test_fresh_parameters_always_verify() {
        // Arrange
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("hunter2", calls.clone()));
        let params = EncryptionParameters::generate(TEST_KDF);

        // Act
        let result = manager.generate_key(&params);

        // Assert
        assert!(result.valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matching_passphrase_verifies_against_stored_mac() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("correct horse", calls));
        let params = params_for("correct horse");

        let result = manager.generate_key(&params);

        assert!(result.valid);
        assert_eq!(Some(result.mac), params.mac);
    }

    #[test]
    fn test_wrong_passphrase_fails_verification() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("wrong", calls));
        let params = params_for("correct horse");

        let result = manager.generate_key(&params);

        assert!(!result.valid);
    }

    #[test]
    fn test_derivation_is_deterministic_for_same_salt() {
        let params = EncryptionParameters::generate(TEST_KDF);
        let (k1, m1) = derive_key_material("secret", &params).unwrap();
        let (k2, m2) = derive_key_material("secret", &params).unwrap();
        assert_eq!(*k1, *k2);
        assert_eq!(m1, m2);
        assert_ne!(&k1[..], &m1[..]);
    }

    #[test]
    fn test_declined_prompt_yields_rejected_result() {
        let mut manager = PassphraseKeyManager::new(Box::new(|_| None));
        let result = manager.generate_key(&EncryptionParameters::generate(TEST_KDF));
        assert!(!result.valid);
    }

    #[test]
    fn test_cached_key_is_served_without_prompting() {
        // Arrange
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("pw", calls.clone()));
        let mut params = EncryptionParameters::generate(TEST_KDF);
        let first = manager.generate_key(&params);
        manager.cache_from_result(&first).expect("cache");

        // Act: a later save reuses the salt with a new nonce and the stored mac
        params.refresh_nonce();
        params.mac = Some(first.mac);
        let second = manager.generate_key(&params);

        // Assert
        assert!(second.valid);
        assert_eq!(*second.key, *first.key);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "prompt must run once");
        assert!(manager.has_cached_key());
    }

    #[test]
    fn test_cache_is_not_used_for_a_different_salt() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("pw", calls.clone()));
        let first = manager.generate_key(&EncryptionParameters::generate(TEST_KDF));
        manager.cache_from_result(&first).unwrap();

        manager.generate_key(&EncryptionParameters::generate(TEST_KDF));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_from_invalid_result_is_refused() {
        let mut manager = PassphraseKeyManager::new(Box::new(|_| None));
        let err = manager
            .cache_from_result(&EncryptionResult::rejected())
            .unwrap_err();
        assert!(matches!(err, KeyError::Unverified));
    }

    #[test]
    fn test_cache_without_prior_derivation_is_refused() {
        let mut manager = PassphraseKeyManager::new(Box::new(|_| None));
        let result = EncryptionResult {
            key: Zeroizing::new([1u8; KEY_LEN]),
            mac: [2u8; MAC_LEN],
            valid: true,
        };
        let err = manager.cache_from_result(&result).unwrap_err();
        assert!(matches!(err, KeyError::MissingMaterial));
    }

    #[test]
    fn test_invalidate_drops_cache() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager = PassphraseKeyManager::new(prompt_with("pw", calls));
        let result = manager.generate_key(&EncryptionParameters::generate(TEST_KDF));
        manager.cache_from_result(&result).unwrap();

        manager.invalidate();

        assert!(!manager.has_cached_key());
    }

    #[test]
    fn test_lockout_after_max_failures_stops_prompting() {
        // Arrange
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager =
            PassphraseKeyManager::new(prompt_with("pw", calls.clone())).with_max_failed_attempts(2);
        let params = EncryptionParameters::generate(TEST_KDF);

        // Act
        manager.last_attempt_failed();
        manager.last_attempt_failed();
        let result = manager.generate_key(&params);

        // Assert
        assert!(manager.is_locked_out());
        assert!(!result.valid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prompt_receives_failure_count_and_success_resets_it() {
        let seen = Arc::new(AtomicU32::new(u32::MAX));
        let seen_in_prompt = seen.clone();
        let mut manager = PassphraseKeyManager::new(Box::new(move |failures| {
            seen_in_prompt.store(failures, Ordering::SeqCst);
            Some(Zeroizing::new("pw".to_string()))
        }));
        manager.last_attempt_failed();

        let result = manager.generate_key(&EncryptionParameters::generate(TEST_KDF));
        manager.cache_from_result(&result).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(manager.failed_attempts(), 0);
    }

    #[test]
    fn test_reset_lockout_allows_prompting_again() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut manager =
            PassphraseKeyManager::new(prompt_with("pw", calls.clone())).with_max_failed_attempts(1);
        manager.last_attempt_failed();
        assert!(manager.is_locked_out());

        manager.reset_lockout();
        let result = manager.generate_key(&EncryptionParameters::generate(TEST_KDF));

        assert!(result.valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_cost_is_a_derivation_error() {
        let mut params = EncryptionParameters::generate(TEST_KDF);
        params.kdf.parallelism = 0;
        let err = derive_key_material("pw", &params).unwrap_err();
        assert!(matches!(err, KeyError::Derivation(_)));
    }

    #[test]
    fn test_oversized_memory_cost_is_refused_without_allocating() {
        let mut params = EncryptionParameters::generate(TEST_KDF);
        params.kdf.memory_kib = 0x4000_0000;

        let err = derive_key_material("pw", &params).unwrap_err();

        assert!(matches!(err, KeyError::Derivation(_)));
    }
}
