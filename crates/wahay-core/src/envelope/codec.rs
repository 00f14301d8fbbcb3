//! Envelope codec for the encrypted configuration file.
//!
//! Wire format:
//! ```text
//! [magic:4 "WHCF"][version:1][memory_kib:4][iterations:4][parallelism:4]
//! [salt:16][nonce:24][mac:32][ciphertext:N][tag:16]
//! ```
//! Header size: 89 bytes.  All multi-byte integers are big-endian.
//!
//! The ciphertext is XChaCha20-Poly1305 over the TOML form of
//! [`ApplicationSettings`].  The whole header is bound as associated data, so
//! flipping any header byte makes the tag check fail just like a wrong key
//! does.  The stored cost parameters are used for key derivation before the
//! tag can be checked, so [`parse_header`] also rejects any cost outside
//! [`KdfParams::is_supported`].

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::keys::{
    EncryptionParameters, EncryptionResult, KdfParams, KEY_LEN, MAC_LEN, NONCE_LEN, SALT_LEN,
};
use crate::domain::settings::ApplicationSettings;

/// File signature.
pub const MAGIC: [u8; 4] = *b"WHCF";
/// Current envelope layout version.
pub const ENVELOPE_VERSION: u8 = 1;
/// Size of the fixed header preceding the ciphertext.
pub const HEADER_SIZE: usize = 4 + 1 + 4 + 4 + 4 + SALT_LEN + NONCE_LEN + MAC_LEN;
/// Size of the Poly1305 authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Errors that can occur while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte slice is shorter than a header plus an empty ciphertext.
    #[error("envelope too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    /// The file does not start with the expected signature.
    #[error("not a configuration envelope (bad magic)")]
    BadMagic,

    /// The envelope was written by an incompatible release.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// The header demands a key-derivation cost outside the accepted range.
    #[error(
        "unsupported key derivation cost: {} KiB, {} passes, {} lanes",
        .0.memory_kib,
        .0.iterations,
        .0.parallelism
    )]
    UnsupportedKdf(KdfParams),

    /// The tag did not verify: wrong key or tampered bytes.
    #[error("envelope authentication failed")]
    AuthenticationFailed,

    /// The decrypted plaintext is not UTF-8.
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,

    /// The decrypted plaintext is not valid settings TOML.
    #[error("failed to parse decrypted settings: {0}")]
    Payload(#[from] toml::de::Error),

    /// The settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The cipher refused to encrypt.
    #[error("encryption failed: {0}")]
    Cipher(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serializes and encrypts `settings` into a complete envelope.
///
/// `params` supplies the salt, cost and nonce; `key` supplies the key and the
/// verifier written into the header.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] or [`CodecError::Cipher`].
pub fn seal(
    settings: &ApplicationSettings,
    params: &EncryptionParameters,
    key: &EncryptionResult,
) -> Result<Vec<u8>, CodecError> {
    let header = encode_header(params, &key.mac);
    let plaintext = Zeroizing::new(settings.to_toml()?.into_bytes());

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.key[..]));
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&params.nonce),
            Payload {
                msg: plaintext.as_slice(),
                aad: header.as_slice(),
            },
        )
        .map_err(|e| CodecError::Cipher(e.to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&ciphertext);
    Ok(buf)
}

/// Reads the derivation parameters from the start of an envelope.
///
/// Returns the parameters (with `mac` set to the stored verifier) and the
/// ciphertext that follows the header.
///
/// # Errors
///
/// Returns [`CodecError::TooShort`], [`CodecError::BadMagic`] or
/// [`CodecError::UnsupportedVersion`] for structurally invalid input, and
/// [`CodecError::UnsupportedKdf`] when the stored cost is out of range.
pub fn parse_header(bytes: &[u8]) -> Result<(EncryptionParameters, &[u8]), CodecError> {
    let needed = HEADER_SIZE + TAG_LEN;
    if bytes.len() < needed {
        return Err(CodecError::TooShort {
            needed,
            available: bytes.len(),
        });
    }
    if bytes[0..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    if bytes[4] != ENVELOPE_VERSION {
        return Err(CodecError::UnsupportedVersion(bytes[4]));
    }

    let mut cursor = 5;
    let kdf = KdfParams {
        memory_kib: read_u32(bytes, &mut cursor),
        iterations: read_u32(bytes, &mut cursor),
        parallelism: read_u32(bytes, &mut cursor),
    };
    if !kdf.is_supported() {
        return Err(CodecError::UnsupportedKdf(kdf));
    }
    let salt: [u8; SALT_LEN] = read_array(bytes, &mut cursor);
    let nonce: [u8; NONCE_LEN] = read_array(bytes, &mut cursor);
    let mac: [u8; MAC_LEN] = read_array(bytes, &mut cursor);
    debug_assert_eq!(cursor, HEADER_SIZE);

    let params = EncryptionParameters {
        kdf,
        salt,
        nonce,
        mac: Some(mac),
    };
    Ok((params, &bytes[HEADER_SIZE..]))
}

/// Verifies and decrypts an envelope, then parses the settings inside.
///
/// # Errors
///
/// Returns [`CodecError::AuthenticationFailed`] when the tag does not verify
/// under `key`, a structural error from [`parse_header`], or
/// [`CodecError::NotUtf8`] / [`CodecError::Payload`] if the plaintext is not
/// valid settings.
pub fn open(bytes: &[u8], key: &[u8; KEY_LEN]) -> Result<ApplicationSettings, CodecError> {
    let (params, ciphertext) = parse_header(bytes)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(&params.nonce),
            Payload {
                msg: ciphertext,
                aad: &bytes[..HEADER_SIZE],
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CodecError::AuthenticationFailed)?;

    let text = std::str::from_utf8(plaintext.as_slice()).map_err(|_| CodecError::NotUtf8)?;
    Ok(ApplicationSettings::from_toml(text)?)
}

// ── Header helpers ────────────────────────────────────────────────────────────

fn encode_header(params: &EncryptionParameters, mac: &[u8; MAC_LEN]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&MAGIC);
    buf.push(ENVELOPE_VERSION);
    buf.extend_from_slice(&params.kdf.memory_kib.to_be_bytes());
    buf.extend_from_slice(&params.kdf.iterations.to_be_bytes());
    buf.extend_from_slice(&params.kdf.parallelism.to_be_bytes());
    buf.extend_from_slice(&params.salt);
    buf.extend_from_slice(&params.nonce);
    buf.extend_from_slice(mac);
    buf
}

/// Callers must have checked that `bytes` holds a full header.
fn read_u32(bytes: &[u8], cursor: &mut usize) -> u32 {
    u32::from_be_bytes(read_array(bytes, cursor))
}

fn read_array<const N: usize>(bytes: &[u8], cursor: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[*cursor..*cursor + N]);
    *cursor += N;
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
