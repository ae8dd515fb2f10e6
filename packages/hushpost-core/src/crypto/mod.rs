//! # Cryptography Module
//!
//! All cryptographic primitives used by HushPost Core.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SYMMETRIC (encryption.rs)                                      │   │
//! │  │  AES-256-GCM, combined form: nonce(12) || ciphertext || tag(16) │   │
//! │  │  Fresh 256-bit SymmetricKey per envelope / local secret         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ASYMMETRIC (keys.rs, signing.rs)                               │   │
//! │  │  RSA-2048                                                       │   │
//! │  │  • chunked PKCS#1 v1.5 encryption (block = k - 11)             │   │
//! │  │  • OAEP-SHA256 wrapping of symmetric keys                      │   │
//! │  │  • PKCS#1 v1.5 signatures over SHA-256 digests                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  DERIVATION (kdf.rs)                                            │   │
//! │  │  PBKDF2-HMAC-SHA256, 10,000 rounds, 16-byte salt → 32 bytes    │   │
//! │  │  HKDF-SHA256 request/response keys from the envelope key       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  RANDOMNESS (random.rs)                                         │   │
//! │  │  OsRng only; failure surfaces as Error::EntropyUnavailable      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure behaviour
//!
//! | Operation | On failure |
//! |-----------|------------|
//! | `SymmetricKey::generate` | `Error::EntropyUnavailable` (fatal) |
//! | `RsaKeyPair::generate` | `Error::KeyGenerationFailed` (fatal) |
//! | `decrypt` | `Error::DecryptionFailed`, never partial plaintext |
//! | `asymmetric_encrypt` / `asymmetric_decrypt` / `sign` | `None` |
//! | `verify` | `false` |
//!
//! Secret keys are zeroized when dropped.

mod encryption;
mod kdf;
mod keys;
mod random;
mod signing;

pub use encryption::{
    decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, Nonce, SymmetricKey, KEY_SIZE,
    NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{
    derive_direction_keys, derive_key, domain, hash_password, verify_password, DirectionKeys,
    PasswordHash, HASH_SIZE, PBKDF2_ITERATIONS, SALT_SIZE,
};
pub use keys::{
    asymmetric_decrypt, asymmetric_encrypt, public_key_from_base64, public_key_from_der,
    public_key_to_der, unwrap_key, wrap_key, RsaKeyPair, RSA_KEY_BITS,
};
pub use rsa::{RsaPrivateKey, RsaPublicKey};

#[cfg(test)]
pub(crate) use keys::fixtures;
pub use random::{fill_random, random_bytes, random_vec, secure_random_string, ALPHANUMERIC};
pub use signing::{sign, verify, Signature};
