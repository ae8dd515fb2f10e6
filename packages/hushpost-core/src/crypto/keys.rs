//! # Asymmetric Keys
//!
//! RSA-2048 key pairs and the two ways the crate encrypts with them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CHUNKED PKCS#1 v1.5 ENCRYPTION                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  k = modulus size in bytes (256 for RSA-2048)                          │
//! │                                                                         │
//! │  plaintext:  [ ≤ k-11 ][ ≤ k-11 ][ ≤ k-11 ] ...                        │
//! │                  │         │         │                                 │
//! │                  ▼         ▼         ▼                                 │
//! │  ciphertext: [    k    ][    k    ][    k    ] ...                     │
//! │                                                                         │
//! │  Decrypt splits into exactly k-byte blocks, in order.                  │
//! │  A ciphertext whose length is not a multiple of k is rejected.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunked encryption carries per-recipient message content. Symmetric
//! envelope keys are wrapped with OAEP-SHA256 instead (`wrap_key`).
//!
//! Private keys never leave this module except as DER handed straight to
//! the credential vault.

use base64::Engine as _;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::encryption::SymmetricKey;
use super::random::fill_random;
use crate::error::{Error, Result};

/// Modulus size for every generated key pair
pub const RSA_KEY_BITS: usize = 2048;

/// PKCS#1 v1.5 encryption padding overhead per block
const PKCS1_PADDING_OVERHEAD: usize = 11;

/// An RSA key pair
///
/// The private half zeroizes itself on drop.
#[derive(Clone)]
pub struct RsaKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaKeyPair {
    /// Generate a fresh 2048-bit pair.
    pub fn generate() -> Result<Self> {
        // Probe the entropy source first so a dead RNG surfaces as a typed
        // error rather than a panic inside prime generation.
        let mut probe = [0u8; 16];
        fill_random(&mut probe)?;

        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| Error::KeyGenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        tracing::debug!("Generated {}-bit RSA key pair", RSA_KEY_BITS);
        Ok(Self { private, public })
    }

    /// Restore from PKCS#8 DER private key bytes
    pub fn from_private_key_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| Error::InvalidKey(format!("private key: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Private key as PKCS#8 DER
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let doc = self
            .private
            .to_pkcs8_der()
            .map_err(|e| Error::SerializationError(format!("private key: {}", e)))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Public key as SubjectPublicKeyInfo DER
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        public_key_to_der(&self.public)
    }

    /// Public key as base64 DER, the form attached to a `User`
    pub fn public_key_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.public_key_der()?))
    }

    /// Public half
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Private half
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &(self.public.size() * 8))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Encode a public key as SubjectPublicKeyInfo DER
pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| Error::SerializationError(format!("public key: {}", e)))
}

/// Parse a SubjectPublicKeyInfo DER public key
pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der)
        .map_err(|e| Error::InvalidKey(format!("public key: {}", e)))
}

/// Parse a base64 DER public key
pub fn public_key_from_base64(encoded: &str) -> Result<RsaPublicKey> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidKey(format!("public key base64: {}", e)))?;
    public_key_from_der(&der)
}

/// Encrypt arbitrary-length data in PKCS#1 v1.5 blocks.
///
/// Returns `None` on any failure.
pub fn asymmetric_encrypt(data: &[u8], public_key: &RsaPublicKey) -> Option<Vec<u8>> {
    let block_size = public_key.size();
    let chunk_size = block_size.checked_sub(PKCS1_PADDING_OVERHEAD)?;
    if chunk_size == 0 {
        return None;
    }

    let mut out = Vec::with_capacity(data.len().div_ceil(chunk_size) * block_size);
    for chunk in data.chunks(chunk_size) {
        match public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, chunk) {
            Ok(block) => out.extend_from_slice(&block),
            Err(e) => {
                tracing::debug!("RSA block encryption failed: {}", e);
                return None;
            }
        }
    }
    Some(out)
}

/// Decrypt data produced by [`asymmetric_encrypt`].
///
/// Returns `None` on any failure, including a length that is not a whole
/// number of blocks. Never returns partial plaintext.
pub fn asymmetric_decrypt(data: &[u8], private_key: &RsaPrivateKey) -> Option<Vec<u8>> {
    let block_size = private_key.size();
    if block_size == 0 || data.len() % block_size != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(data.len());
    for block in data.chunks(block_size) {
        match private_key.decrypt(Pkcs1v15Encrypt, block) {
            Ok(chunk) => out.extend_from_slice(&chunk),
            Err(e) => {
                tracing::debug!("RSA block decryption failed: {}", e);
                return None;
            }
        }
    }
    Some(out)
}

/// Wrap a symmetric key for `public_key` with RSA-OAEP-SHA256.
pub fn wrap_key(key: &SymmetricKey, public_key: &RsaPublicKey) -> Result<Vec<u8>> {
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| Error::EncryptionFailed(format!("key wrap: {}", e)))
}

/// Recover a symmetric key wrapped by [`wrap_key`].
pub fn unwrap_key(wrapped: &[u8], private_key: &RsaPrivateKey) -> Result<SymmetricKey> {
    let raw = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| Error::DecryptionFailed("key unwrap failed".into()))?,
    );
    SymmetricKey::from_slice(&raw)
}

// ============================================================================
// TEST FIXTURES
// ============================================================================


// ============================================================================
// TESTS
// ============================================================================
