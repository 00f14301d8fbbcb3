//! Per-installation configuration identifier.

use rand::RngCore;

/// Number of random bytes behind a unique configuration identifier.
pub const UNIQUE_ID_BYTES: usize = 32;

/// Generates a fresh identifier: 32 bytes from the OS-seeded CSPRNG,
/// lowercase hex encoded to 64 characters.
pub fn generate_unique_id() -> String {
    let mut bytes = [0u8; UNIQUE_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_is_64_lowercase_hex_chars() {
        let id = generate_unique_id();
        assert_eq!(id.len(), UNIQUE_ID_BYTES * 2);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_unique_ids_differ() {
        assert_ne!(generate_unique_id(), generate_unique_id());
    }
}
