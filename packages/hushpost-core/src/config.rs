//! # Configuration
//!
//! Everything the core needs to know at startup, in one serde tree so the
//! host can hand over a (partial) JSON object:
//!
//! ```json
//! {
//!   "transport": { "tor_binary": "/app/bin/tor", "data_dir": "/app/tor" },
//!   "protocol":  { "server_public_key": "MIIBIjANBgkq..." }
//! }
//! ```
//!
//! Omitted fields keep their defaults. The daemon ports and the bridge line
//! are fixed per build; no alternate bridges or ports are negotiated at
//! runtime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default obfuscated bridge
pub const DEFAULT_BRIDGE: &str = "obfs4 192.0.2.1:443 2C8017E8EBF4B0640AE4B4F2AEA8E7E8ECDDCD1F cert=NfvQfMkW7LXhHFOtvUq9VS8tKUjynlJCKG0qzE2ieTz0QwN57dOwz8QoQcHqpdB0D9xOCQ iat-mode=0";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Onion daemon and proxy
    pub transport: TransportConfig,
    /// Remote endpoints and server key
    pub protocol: ProtocolConfig,
    /// Secret storage
    pub vault: VaultConfig,
}

impl CoreConfig {
    /// Parse a JSON object, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        self.protocol.validate()
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Onion daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Path to the daemon executable
    pub tor_binary: PathBuf,
    /// Daemon state directory
    pub data_dir: PathBuf,
    /// Local SOCKS proxy port
    pub socks_port: u16,
    /// Local control port
    pub control_port: u16,
    /// Local DNS port
    pub dns_port: u16,
    /// Local transparent-proxy port
    pub trans_port: u16,
    /// `ClientTransportPlugin` line
    pub transport_plugin: String,
    /// The single configured bridge
    pub bridge: String,
    /// Control-port password, when the daemon uses HASHEDPASSWORD auth
    pub control_password: Option<String>,
    /// Bootstrap polls before giving up
    pub bootstrap_attempts: u32,
    /// Delay between bootstrap polls
    pub poll_interval_ms: u64,
    /// Limit on each control-port connect, authenticate or status query
    pub control_timeout_ms: u64,
    /// Per-request timeout through the proxy
    pub request_timeout_secs: u64,
    /// `User-Agent` header on every request
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tor_binary: PathBuf::from("tor"),
            data_dir: std::env::temp_dir().join("hushpost-tor"),
            socks_port: 39050,
            control_port: 39051,
            dns_port: 39052,
            trans_port: 39053,
            transport_plugin: "obfs4 exec ./obfs4proxy".into(),
            bridge: DEFAULT_BRIDGE.into(),
            control_password: None,
            bootstrap_attempts: 60,
            poll_interval_ms: 1000,
            control_timeout_ms: 5000,
            request_timeout_secs: 60,
            user_agent: "HushPost".into(),
        }
    }
}

impl TransportConfig {
    /// Reject port collisions, a zero attempt budget and a zero control timeout
    pub fn validate(&self) -> Result<()> {
        let ports = [self.socks_port, self.control_port, self.dns_port, self.trans_port];
        for (i, a) in ports.iter().enumerate() {
            if *a == 0 {
                return Err(Error::InvalidConfig("ports must be non-zero".into()));
            }
            if ports[i + 1..].contains(a) {
                return Err(Error::InvalidConfig(format!("port {} used twice", a)));
            }
        }
        if self.bootstrap_attempts == 0 {
            return Err(Error::InvalidConfig("bootstrap_attempts must be at least 1".into()));
        }
        if self.control_timeout_ms == 0 {
            return Err(Error::InvalidConfig("control_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// Proxy URL for the HTTP client; `socks5h` resolves names inside the circuit
    pub fn socks_proxy_url(&self) -> String {
        format!("socks5h://127.0.0.1:{}", self.socks_port)
    }

    /// Control-port address
    pub fn control_addr(&self) -> String {
        format!("127.0.0.1:{}", self.control_port)
    }
}

// ============================================================================
// PROTOCOL
// ============================================================================

/// Remote endpoint paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    /// Account creation
    pub register: String,
    /// Sign-in
    pub login: String,
    /// Profile changes
    pub update_profile: String,
    /// Outbound message
    pub send_message: String,
    /// Inbox poll
    pub fetch_messages: String,
    /// New group
    pub create_group: String,
    /// Group invitation
    pub invite_to_group: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            register: "/api/register".into(),
            login: "/api/login".into(),
            update_profile: "/api/update_profile".into(),
            send_message: "/api/send_message".into(),
            fetch_messages: "/api/fetch_messages".into(),
            create_group: "/api/create_group".into(),
            invite_to_group: "/api/invite_to_group".into(),
        }
    }
}

/// Remote protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Server origin, normally an onion address
    pub base_url: String,
    /// Endpoint paths
    pub endpoints: EndpointPaths,
    /// Server RSA public key (base64 DER) for envelope key delivery
    pub server_public_key: Option<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            base_url: "http://anonymousmsg.onion".into(),
            endpoints: EndpointPaths::default(),
            server_public_key: None,
        }
    }
}

impl ProtocolConfig {
    /// Reject a base URL reqwest cannot parse
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.base_url)
            .map(|_| ())
            .map_err(|e| Error::InvalidConfig(format!("base_url: {}", e)))
    }

    /// Absolute URL for an endpoint path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

// ============================================================================
// VAULT
// ============================================================================

/// Secret storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Keychain service name
    pub service_name: String,
    /// Tag under which the user's key pair is stored
    pub key_pair_tag: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            service_name: "com.hushpost.core".into(),
            key_pair_tag: "com.hushpost.rsa".into(),
        }
    }
}
