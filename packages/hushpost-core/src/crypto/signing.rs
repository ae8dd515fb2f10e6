//! # Digital Signatures
//!
//! RSA PKCS#1 v1.5 signatures over a SHA-256 digest of the data.
//!
//! ```text
//!  sign:    data ──SHA-256──► digest ──RSA(private)──► signature (256 bytes)
//!  verify:  data ──SHA-256──► digest ◄──compare── RSA(public, signature)
//! ```
//!
//! Both sides hash with the same algorithm; any mismatch verifies false.
//! [`verify`] accepts untrusted input and never panics or errors.

use base64::Engine as _;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A detached signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Base64 form used in message records
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    /// Parse the base64 form
    pub fn from_base64(encoded: &str) -> Result<Self> {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map(Self)
            .map_err(|e| Error::DeserializationError(format!("signature: {}", e)))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Sign the SHA-256 digest of `data`.
pub fn sign(data: &[u8], private_key: &RsaPrivateKey) -> Option<Signature> {
    let digest = Sha256::digest(data);
    match private_key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest) {
        Ok(sig) => Some(Signature(sig)),
        Err(e) => {
            tracing::debug!("RSA signing failed: {}", e);
            None
        }
    }
}

/// Verify `signature` over `data` against `public_key`.
pub fn verify(signature: &Signature, data: &[u8], public_key: &RsaPublicKey) -> bool {
    if signature.0.len() != public_key.size() {
        return false;
    }
    let digest = Sha256::digest(data);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature.0)
        .is_ok()
}

// ============================================================================
// TESTS
// ============================================================================
