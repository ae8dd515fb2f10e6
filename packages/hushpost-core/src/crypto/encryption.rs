//! # Symmetric Encryption
//!
//! AES-256-GCM in combined form. Every envelope and every locally stored
//! secret is sealed with a freshly generated [`SymmetricKey`].
//!
//! ## Wire layout
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────────────┐
//! │  nonce (12)  │  ciphertext (len(plaintext)) │  auth tag (16)   │
//! └──────────────┴──────────────────────────────┴──────────────────┘
//! ```
//!
//! ## Failure semantics
//!
//! Decryption fails closed: a wrong key, a flipped bit, a truncated buffer,
//! or mismatched associated data all yield `Error::DecryptionFailed` and no
//! plaintext bytes at all.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::random::{fill_random, random_bytes};
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce for AES-GCM encryption
///
/// **Never reuse a nonce with the same key.** Nonces are random, which is
/// safe well beyond the handful of messages any one key protects here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Result<Self> {
        Ok(Self(random_bytes()?))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM key
///
/// Zeroized when dropped. `Debug` never prints key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a fresh random key.
    ///
    /// Fails with [`Error::EntropyUnavailable`] when the OS random source
    /// cannot deliver; callers must treat that as fatal.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "symmetric key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    encrypt_with_aad(plaintext, key, &[])
}

/// Decrypt a combined buffer produced by [`encrypt`].
pub fn decrypt(combined: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    decrypt_with_aad(combined, key, &[])
}

/// Encrypt with additional authenticated data bound into the tag.
pub fn encrypt_with_aad(plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::random()?;

    let ciphertext = key
        .cipher()
        .encrypt(
            AesNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| Error::EncryptionFailed(format!("AES-GCM: {}", e)))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(nonce.as_bytes());
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt with additional authenticated data; the AAD must match exactly.
pub fn decrypt_with_aad(combined: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
    if combined.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::DecryptionFailed(format!(
            "ciphertext too short: {} bytes",
            combined.len()
        )));
    }

    let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);

    key.cipher()
        .decrypt(
            AesNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| Error::DecryptionFailed("authentication tag mismatch".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = SymmetricKey::generate().unwrap();
        let plaintext = b"Hello, World!";

        let combined = encrypt(plaintext, &key).unwrap();
        assert_eq!(combined.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        let decrypted = decrypt(&combined, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = SymmetricKey::from_bytes([42u8; 32]);
        let combined = encrypt(b"", &key).unwrap();
        assert!(decrypt(&combined, &key).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let k1 = SymmetricKey::generate().unwrap();
        let k2 = SymmetricKey::generate().unwrap();

        let combined = encrypt(b"for k1 only", &k1).unwrap();
        let result = decrypt(&combined, &k2);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SymmetricKey::generate().unwrap();
        let mut combined = encrypt(b"Hello, World!", &key).unwrap();

        combined[NONCE_SIZE] ^= 0xFF;
        assert!(decrypt(&combined, &key).is_err());
    }

    #[test]
    fn test_tampered_tag_fails() {
        let key = SymmetricKey::generate().unwrap();
        let mut combined = encrypt(b"Hello, World!", &key).unwrap();

        let last = combined.len() - 1;
        combined[last] ^= 0x01;
        assert!(decrypt(&combined, &key).is_err());
    }

    #[test]
    fn test_truncated_input_fails() {
        let key = SymmetricKey::generate().unwrap();
        assert!(decrypt(&[], &key).is_err());
        assert!(decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1], &key).is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = SymmetricKey::generate().unwrap();
        let combined = encrypt_with_aad(b"payload", &key, b"context").unwrap();

        assert_eq!(
            decrypt_with_aad(&combined, &key, b"context").unwrap(),
            b"payload"
        );
        assert!(decrypt_with_aad(&combined, &key, b"other").is_err());
        assert!(decrypt(&combined, &key).is_err());
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = SymmetricKey::from_bytes([7u8; 32]);
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SymmetricKey::generate().unwrap();
        let b = SymmetricKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(SymmetricKey::from_slice(&[0u8; 31]).is_err());
        assert!(SymmetricKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xAB; 32]);
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains("171"));
        assert!(dbg.contains("REDACTED"));
    }
}
