//! Secure random generation.
//!
//! Every byte of key material, nonce, and salt in the crate comes from
//! [`fill_random`]. The OS source is asked with `try_fill_bytes` so an
//! exhausted or broken entropy source becomes [`Error::EntropyUnavailable`]
//! instead of a panic deep inside a cipher.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};

/// Alphabet used by [`secure_random_string`]
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fill `buf` from the operating system's CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        tracing::error!("OS random source failed: {}", e);
        Error::EntropyUnavailable
    })
}

/// Fixed-size array of random bytes.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

/// Heap buffer of random bytes.
pub fn random_vec(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

/// Random string drawn uniformly from [`ALPHANUMERIC`].
///
/// For opaque identifiers only; never use the output as key material.
pub fn secure_random_string(length: usize) -> Result<String> {
    // Largest multiple of the alphabet size that fits in a byte; bytes at
    // or above it are rejected so every character is equally likely.
    let limit = (256 / ALPHANUMERIC.len() * ALPHANUMERIC.len()) as u8;

    let mut out = String::with_capacity(length);
    let mut pool = [0u8; 64];
    while out.len() < length {
        fill_random(&mut pool)?;
        for &b in pool.iter().filter(|&&b| b < limit) {
            if out.len() == length {
                break;
            }
            out.push(ALPHANUMERIC[b as usize % ALPHANUMERIC.len()] as char);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; 32] = random_bytes().unwrap();
        let b: [u8; 32] = random_bytes().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_vec_length() {
        assert_eq!(random_vec(0).unwrap().len(), 0);
        assert_eq!(random_vec(77).unwrap().len(), 77);
    }

    #[test]
    fn test_random_string_length_and_alphabet() {
        for len in [0, 1, 16, 100] {
            let s = secure_random_string(len).unwrap();
            assert_eq!(s.len(), len);
            assert!(s.bytes().all(|c| ALPHANUMERIC.contains(&c)));
        }
    }

    #[test]
    fn test_random_strings_are_distinct() {
        let a = secure_random_string(24).unwrap();
        let b = secure_random_string(24).unwrap();
        assert_ne!(a, b);
    }
}
