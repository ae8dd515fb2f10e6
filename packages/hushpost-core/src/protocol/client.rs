//! Sealed request/reply round trips over the transport.

use serde::Serialize;
use zeroize::Zeroizing;

use super::envelope::seal_request;
use super::reply::Reply;
use crate::config::{EndpointPaths, ProtocolConfig};
use crate::crypto::{public_key_from_base64, RsaPublicKey};
use crate::error::{Error, Result};
use crate::transport::AnonymizingTransport;

/// Content type of every sealed request
pub const ENVELOPE_CONTENT_TYPE: &str = "application/octet-stream";

/// Sends sealed records to the server's fixed endpoints
pub struct ProtocolClient {
    transport: AnonymizingTransport,
    config: ProtocolConfig,
    server_key: Option<RsaPublicKey>,
}

impl ProtocolClient {
    /// Build a client; a configured server key must parse
    pub fn new(transport: AnonymizingTransport, config: ProtocolConfig) -> Result<Self> {
        let server_key = config
            .server_public_key
            .as_deref()
            .map(public_key_from_base64)
            .transpose()
            .map_err(|e| Error::InvalidConfig(format!("server_public_key: {}", e)))?;
        Ok(Self {
            transport,
            config,
            server_key,
        })
    }

    /// Endpoint paths
    pub fn endpoints(&self) -> &EndpointPaths {
        &self.config.endpoints
    }

    /// Underlying transport
    pub fn transport(&self) -> &AnonymizingTransport {
        &self.transport
    }

    /// Seal `record`, POST it to `path`, and open the reply.
    ///
    /// A reply without `success: true` becomes [`Error::ServerRejected`]
    /// carrying the server's message or `fallback`.
    pub async fn call<R: Serialize>(&self, path: &str, record: &R, fallback: &str) -> Result<Reply> {
        if !self.transport.is_connected() {
            return Err(Error::NotConnected);
        }
        let server_key = self
            .server_key
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("server_public_key is not configured".into()))?;

        let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
        let (body, pending) = seal_request(&plaintext, server_key, path.as_bytes())?;

        let url = self.config.url_for(path);
        let response = self
            .transport
            .dispatch(
                "POST",
                &url,
                Some(body),
                vec![("Content-Type".to_string(), ENVELOPE_CONTENT_TYPE.to_string())],
            )
            .await?;

        let opened = Zeroizing::new(pending.open(&response)?);
        let reply = Reply::parse(&opened)?.into_result(fallback);
        if let Err(e) = &reply {
            tracing::debug!(path, "Server rejected request: {}", e);
        }
        reply
    }
}
