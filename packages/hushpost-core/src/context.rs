//! # Client Context
//!
//! Owns one instance of every service and hands out shared references.
//!
//! ```text
//! ClientContext
//!  ├── config      CoreConfig
//!  ├── vault       Arc<CredentialVault>
//!  ├── transport   AnonymizingTransport      (cheap clone, shared state)
//!  ├── client      Arc<ProtocolClient>       (holds a transport clone)
//!  ├── session     Session                   (current user, shared)
//!  ├── identity    IdentityService           (writes the session)
//!  └── messaging   MessagingService          (reads the session)
//! ```
//!
//! The current user and the connection state have exactly one writer each:
//! [`IdentityService`] and [`AnonymizingTransport`]. Everything else reads.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::Result;
use crate::protocol::{IdentityService, MessagingService, ProtocolClient, Session};
use crate::transport::AnonymizingTransport;
use crate::vault::CredentialVault;

/// Dependency bundle for one client
pub struct ClientContext {
    config: CoreConfig,
    vault: Arc<CredentialVault>,
    transport: AnonymizingTransport,
    client: Arc<ProtocolClient>,
    session: Session,
    identity: IdentityService,
    messaging: MessagingService,
}

impl ClientContext {
    /// Context over the platform vault and the real onion daemon
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let vault = Arc::new(CredentialVault::platform(&config.vault.service_name));
        let transport = AnonymizingTransport::new(config.transport.clone())?;
        Self::with_parts(config, vault, transport)
    }

    /// Context over caller-supplied vault and transport
    pub fn with_parts(
        config: CoreConfig,
        vault: Arc<CredentialVault>,
        transport: AnonymizingTransport,
    ) -> Result<Self> {
        let client = Arc::new(ProtocolClient::new(transport.clone(), config.protocol.clone())?);
        let session = Session::new();
        let tag = config.vault.key_pair_tag.clone();

        let identity = IdentityService::new(client.clone(), vault.clone(), session.clone(), tag.clone());
        let messaging = MessagingService::new(client.clone(), vault.clone(), session.clone(), tag);

        tracing::debug!(
            service = %config.vault.service_name,
            base_url = %crate::logging::RedactedUrl(&config.protocol.base_url),
            "Client context ready"
        );

        Ok(Self {
            config,
            vault,
            transport,
            client,
            session,
            identity,
            messaging,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Secret custody
    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    /// Onion transport
    pub fn transport(&self) -> &AnonymizingTransport {
        &self.transport
    }

    /// Sealed request client
    pub fn client(&self) -> &Arc<ProtocolClient> {
        &self.client
    }

    /// Current-user holder
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Account operations
    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    /// Message and group operations
    pub fn messaging(&self) -> &MessagingService {
        &self.messaging
    }

    /// Stop the transport and forget the current user
    pub async fn shutdown(&self) {
        self.transport.stop().await;
        self.session.clear();
    }
}
