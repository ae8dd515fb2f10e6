//! Lightweight salted digest for local integrity checks.
//!
//! `SHA-256(text || salt)` rendered as lowercase hex. This is a single
//! digest, not a password KDF; password material goes through
//! `crypto::hash_password` instead.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::crypto::random_vec;
use crate::error::Result;

/// Salt length generated by [`secure_hash`] (256 bits)
pub const SECURE_HASH_SALT_SIZE: usize = 32;

/// Hash `text` with `salt`, generating a fresh 32-byte salt when omitted.
///
/// Returns `(hex_hash, salt)`.
pub fn secure_hash(text: &str, salt: Option<&[u8]>) -> Result<(String, Vec<u8>)> {
    let salt = match salt {
        Some(s) => s.to_vec(),
        None => random_vec(SECURE_HASH_SALT_SIZE)?,
    };

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(&salt);
    Ok((hex::encode(hasher.finalize()), salt))
}

/// Recompute and compare against `hash` in constant time.
pub fn verify_hash(text: &str, hash: &str, salt: &[u8]) -> bool {
    match secure_hash(text, Some(salt)) {
        Ok((computed, _)) => {
            let expected = hash.to_ascii_lowercase();
            computed.len() == expected.len()
                && bool::from(computed.as_bytes().ct_eq(expected.as_bytes()))
        }
        Err(_) => false,
    }
}
