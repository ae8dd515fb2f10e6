//! # HushPost Core
//!
//! Secure transport and identity core for the HushPost anonymous messaging
//! client. The mobile UI calls into this library for every operation that
//! touches keys, secrets, or the network.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HUSHPOST CORE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  ffi: hushpost_call(method, json) ──► dispatcher                 │  │
//! │  └───────────────────────────────┬──────────────────────────────────┘  │
//! │                                  ▼                                      │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  context: ClientContext (one owner per service)                  │  │
//! │  └──────┬──────────────────────┬───────────────────────┬────────────┘  │
//! │         ▼                      ▼                       ▼               │
//! │  ┌─────────────┐   ┌──────────────────────┐   ┌─────────────────┐     │
//! │  │   Vault     │   │      Protocol        │   │   Transport     │     │
//! │  │             │   │                      │   │                 │     │
//! │  │ - Secrets   │   │ - Identity           │──►│ - Onion daemon  │     │
//! │  │ - Key pairs │   │ - Messaging          │   │ - Control port  │     │
//! │  │ - Presence  │   │ - Envelopes          │   │ - SOCKS HTTP    │     │
//! │  │ - Integrity │   │                      │   │                 │     │
//! │  └──────┬──────┘   └──────────┬───────────┘   └─────────────────┘     │
//! │         └─────────────┬───────┘                                         │
//! │                       ▼                                                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  crypto: AES-256-GCM │ RSA-2048 │ PBKDF2 │ HKDF │ random         │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Daemon, endpoint and vault settings
//! - [`logging`] - Subscriber setup and redaction wrappers
//! - [`crypto`] - Cryptographic primitives (keys, encryption, signing)
//! - [`vault`] - Secret custody, presence checks, integrity attestation
//! - [`transport`] - Onion daemon lifecycle and proxied requests
//! - [`protocol`] - Sealed request envelopes, accounts, messages, groups
//! - [`context`] - Dependency bundle owning one of each service
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Network Anonymity (onion routing)                            │
//! │  ──────────────────────────────────────────                             │
//! │  Requests leave the device only through the local SOCKS proxy of an    │
//! │  obfs4-bridged onion daemon, and only once the circuit has fully       │
//! │  bootstrapped. Hostnames resolve inside the circuit.                   │
//! │                                                                         │
//! │  Layer 2: Request Envelopes (RSA-OAEP + AES-256-GCM)                   │
//! │  ─────────────────────────────────────────────────────                  │
//! │  Every request is sealed under a fresh key wrapped for the server;     │
//! │  the reply comes back under a key derived from the same secret.        │
//! │                                                                         │
//! │  Layer 3: End-to-End Content (chunked RSA + signatures)                │
//! │  ─────────────────────────────────────────────────────                  │
//! │  Message content is sealed for the recipient's public key and signed   │
//! │  with the sender's private key. The server relays it opaquely.         │
//! │                                                                         │
//! │  Layer 4: Local Custody (Keychain / vault)                             │
//! │  ─────────────────────────────────────────                              │
//! │  Private keys and secrets live only in the vault, optionally sealed    │
//! │  again under a wrapping key bound to each item's name.                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Platform Support
//!
//! | Platform | Transport | Storage | Status |
//! |----------|-----------|---------|--------|
//! | iOS | Tor + obfs4 | Keychain | Supported |
//! | macOS | Tor + obfs4 | Keychain | Supported |
//! | Android | Tor + obfs4 | Host-provided backend | Supported |
//! | Linux | Tor + obfs4 | In-memory | Development |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod time;
pub mod transport;
pub mod vault;

#[cfg(feature = "ffi")]
pub mod ffi;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::CoreConfig;
pub use context::ClientContext;
pub use crypto::{RsaKeyPair, Signature, SymmetricKey};
pub use error::{Error, ErrorCategory, Result};
pub use protocol::{Group, IdentityService, Message, MessageKind, MessageTarget, MessagingService, User};
pub use transport::{AnonymizingTransport, ConnectionState};
pub use vault::{CredentialVault, IntegrityVerdict};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of HushPost Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        #[cfg(target_os = "ios")]
        target: "ios",
        #[cfg(target_os = "android")]
        target: "android",
        #[cfg(target_os = "macos")]
        target: "macos",
        #[cfg(target_os = "linux")]
        target: "linux",
        #[cfg(target_os = "windows")]
        target: "windows",
        #[cfg(not(any(
            target_os = "ios",
            target_os = "android",
            target_os = "macos",
            target_os = "linux",
            target_os = "windows"
        )))]
        target: "unknown",
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        verbose_logging: cfg!(feature = "verbose-logging"),
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target OS
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
    /// Whether envelope sizes are traced
    pub verbose_logging: bool,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert_eq!(info.verbose_logging, cfg!(feature = "verbose-logging"));
    }
}
