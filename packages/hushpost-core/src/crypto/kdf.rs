//! # Key Derivation Functions
//!
//! Two unrelated derivations live here:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PASSWORD HASHING (identity registration / login)                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  PBKDF2-HMAC-SHA256(                                                   │
//! │    password   = UTF-8 password,                                        │
//! │    salt       = 16 random bytes (or the caller's stored salt),         │
//! │    iterations = 10,000,                                                │
//! │  )  →  32-byte hash                                                    │
//! │                                                                         │
//! │  Deterministic for a given (password, salt).                           │
//! │                                                                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ENVELOPE DIRECTION KEYS                                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  K = fresh SymmetricKey for one request                                │
//! │                                                                         │
//! │  request_key  = HKDF-SHA256(ikm = K, info = "hushpost-envelope-req-v1")│
//! │  response_key = HKDF-SHA256(ikm = K, info = "hushpost-envelope-rsp-v1")│
//! │                                                                         │
//! │  The server recovers K from the wrapped key and derives the same pair. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `vault::secure_hash` is a separate single-digest hash for local checks;
//! the two are not interchangeable.

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encryption::{SymmetricKey, KEY_SIZE};
use super::random::random_vec;
use crate::error::{Error, Result};

/// PBKDF2 rounds for password hashing
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Salt length generated when the caller supplies none (128 bits)
pub const SALT_SIZE: usize = 16;

/// Password hash output length (256 bits)
pub const HASH_SIZE: usize = 32;

/// Domain separation strings for HKDF
pub mod domain {
    /// Request direction of a sealed envelope
    pub const ENVELOPE_REQUEST: &[u8] = b"hushpost-envelope-req-v1";

    /// Response direction of a sealed envelope
    pub const ENVELOPE_RESPONSE: &[u8] = b"hushpost-envelope-rsp-v1";
}

/// Result of [`hash_password`]: the derived hash and the salt that produced it
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordHash {
    /// PBKDF2 output
    pub hash: [u8; HASH_SIZE],
    /// Salt used for this hash
    pub salt: Vec<u8>,
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("hash", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

/// Hash a password with PBKDF2-HMAC-SHA256.
///
/// With `salt = None` a fresh 16-byte salt is generated; pass the stored
/// salt back in to re-derive the same hash for verification.
pub fn hash_password(password: &str, salt: Option<&[u8]>) -> Result<PasswordHash> {
    let salt = match salt {
        Some(s) if s.is_empty() => {
            return Err(Error::InvalidInput("salt must not be empty".into()));
        }
        Some(s) => s.to_vec(),
        None => random_vec(SALT_SIZE)?,
    };

    let mut hash = [0u8; HASH_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    Ok(PasswordHash { hash, salt })
}

/// Re-derive and compare in constant time.
pub fn verify_password(password: &str, expected: &PasswordHash) -> bool {
    match hash_password(password, Some(&expected.salt)) {
        Ok(candidate) => bool::from(candidate.hash.ct_eq(&expected.hash)),
        Err(_) => false,
    }
}

/// HKDF-SHA256 expansion to a 256-bit symmetric key.
pub fn derive_key(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|_| Error::Internal("HKDF expansion failed".into()))?;

    let key = SymmetricKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}

/// Request/response keys for one envelope round trip
pub struct DirectionKeys {
    /// Seals the outbound record
    pub request: SymmetricKey,
    /// Opens the server's reply
    pub response: SymmetricKey,
}

/// Split a per-request envelope key into its two direction keys.
pub fn derive_direction_keys(envelope_key: &SymmetricKey) -> Result<DirectionKeys> {
    Ok(DirectionKeys {
        request: derive_key(envelope_key.as_bytes(), None, domain::ENVELOPE_REQUEST)?,
        response: derive_key(envelope_key.as_bytes(), None, domain::ENVELOPE_RESPONSE)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
