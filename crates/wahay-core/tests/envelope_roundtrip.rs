//! Integration tests for the wahay-core public API.
//!
//! These tests exercise the passphrase key manager and the envelope codec
//! together, the way the configuration store drives them: derive a key for
//! fresh parameters, seal, then read the header back and unlock with a
//! second manager that only knows the passphrase.

use wahay_core::{
    open, parse_header, seal, ApplicationSettings, CodecError, EncryptionParameters, KdfParams,
    KeyManager, PassphraseKeyManager,
};
use zeroize::Zeroizing;

const TEST_KDF: KdfParams = KdfParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

fn manager_with(secret: &'static str) -> PassphraseKeyManager {
    PassphraseKeyManager::new(Box::new(move |_| Some(Zeroizing::new(secret.to_string()))))
}

fn sealed_with(secret: &'static str, settings: &ApplicationSettings) -> Vec<u8> {
    let mut writer = manager_with(secret);
    let params = EncryptionParameters::generate(TEST_KDF);
    let key = writer.generate_key(&params);
    assert!(key.valid, "fresh parameters must always verify");
    seal(settings, &params, &key).expect("seal must succeed")
}

#[test]
fn test_passphrase_round_trip_restores_settings() {
    // Arrange
    let mut settings = ApplicationSettings::baseline();
    settings.unique_configuration_id = "e1".repeat(32);
    settings.auto_join = false;
    let bytes = sealed_with("open sesame", &settings);

    // Act
    let (params, _) = parse_header(&bytes).expect("header");
    let mut reader = manager_with("open sesame");
    let key = reader.generate_key(&params);
    let restored = open(&bytes, &key.key).expect("open");

    // Assert
    assert!(key.valid);
    assert_eq!(restored, settings);
}

#[test]
fn test_wrong_passphrase_is_caught_by_verifier_and_by_tag() {
    let bytes = sealed_with("right", &ApplicationSettings::baseline());

    let (params, _) = parse_header(&bytes).unwrap();
    let mut reader = manager_with("wrong");
    let key = reader.generate_key(&params);

    assert!(!key.valid, "verifier must reject the wrong passphrase");
    assert!(matches!(
        open(&bytes, &key.key),
        Err(CodecError::AuthenticationFailed)
    ));
}

#[test]
fn test_two_seals_of_same_settings_differ() {
    let settings = ApplicationSettings::baseline();
    let a = sealed_with("pw", &settings);
    let b = sealed_with("pw", &settings);
    assert_ne!(a, b, "fresh salt and nonce must randomize the envelope");
}
