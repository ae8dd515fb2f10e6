//! # Request Envelopes
//!
//! Wire wrapper for every remote call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ENVELOPE ROUND TRIP                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  client                                              server             │
//! │  K = fresh 256-bit key                                                  │
//! │  (Kreq, Krsp) = HKDF(K)                                                 │
//! │  wrapped = RSA-OAEP(K, server_pub)                                      │
//! │  ct = AES-GCM(Kreq, record, aad=path)                                   │
//! │  bincode{version, wrapped, ct} ─────────────────────►                   │
//! │                                               K = RSA-OAEP⁻¹(wrapped)   │
//! │                                               record = AES-GCM⁻¹(Kreq)  │
//! │                      ◄───────────────────── AES-GCM(Krsp, reply, path)  │
//! │  reply = AES-GCM⁻¹(Krsp)                                                │
//! │  K, Kreq, Krsp zeroized                                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The endpoint path is bound as associated data, so a sealed login cannot
//! be replayed against the register endpoint.

use serde::{Deserialize, Serialize};

use crate::crypto::{
    decrypt_with_aad, derive_direction_keys, encrypt_with_aad, unwrap_key, wrap_key, DirectionKeys,
    RsaPrivateKey, RsaPublicKey, SymmetricKey,
};
use crate::error::{Error, Result};

/// Current envelope format
pub const ENVELOPE_VERSION: u8 = 1;

/// Sealed request as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Format version
    pub version: u8,
    /// Envelope key wrapped for the server
    pub wrapped_key: Vec<u8>,
    /// AES-GCM combined ciphertext of the request record
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Encode for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Decode from the wire
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Self = bincode::deserialize(bytes)
            .map_err(|e| Error::DeserializationError(format!("envelope: {}", e)))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(Error::DeserializationError(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }
}

/// Client-side context needed to open the reply to one request
pub struct PendingReply {
    keys: DirectionKeys,
    aad: Vec<u8>,
}

impl PendingReply {
    /// Decrypt the server's reply; consumes and wipes the keys
    pub fn open(self, body: &[u8]) -> Result<Vec<u8>> {
        decrypt_with_aad(body, &self.keys.response, &self.aad)
            .map_err(|_| Error::MalformedResponse("response did not decrypt".into()))
    }
}

/// Seal a request record for the server.
///
/// Returns the wire bytes and the context that opens the matching reply.
pub fn seal_request(
    record: &[u8],
    server_key: &RsaPublicKey,
    aad: &[u8],
) -> Result<(Vec<u8>, PendingReply)> {
    let envelope_key = SymmetricKey::generate()?;
    let keys = derive_direction_keys(&envelope_key)?;
    let envelope = SealedEnvelope {
        version: ENVELOPE_VERSION,
        wrapped_key: wrap_key(&envelope_key, server_key)?,
        ciphertext: encrypt_with_aad(record, &keys.request, aad)?,
    };

    #[cfg(feature = "verbose-logging")]
    tracing::trace!(
        record = record.len(),
        wrapped = envelope.wrapped_key.len(),
        sealed = envelope.ciphertext.len(),
        "Sealed request envelope"
    );

    Ok((
        envelope.to_bytes()?,
        PendingReply {
            keys,
            aad: aad.to_vec(),
        },
    ))
}

/// Server-side context for answering one request
pub struct ReplySealer {
    keys: DirectionKeys,
    aad: Vec<u8>,
}

impl ReplySealer {
    /// Encrypt the reply record; consumes and wipes the keys
    pub fn seal(self, reply: &[u8]) -> Result<Vec<u8>> {
        encrypt_with_aad(reply, &self.keys.response, &self.aad)
    }
}

/// Open a sealed request with the server's private key
pub fn open_request(
    bytes: &[u8],
    server_key: &RsaPrivateKey,
    aad: &[u8],
) -> Result<(Vec<u8>, ReplySealer)> {
    let envelope = SealedEnvelope::from_bytes(bytes)?;
    let envelope_key = unwrap_key(&envelope.wrapped_key, server_key)?;
    let keys = derive_direction_keys(&envelope_key)?;
    let record = decrypt_with_aad(&envelope.ciphertext, &keys.request, aad)?;
    Ok((
        record,
        ReplySealer {
            keys,
            aad: aad.to_vec(),
        },
    ))
}
