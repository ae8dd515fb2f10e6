//! # Error Handling
//!
//! Error types for HushPost Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Environment Errors (fatal)                                        │
//! │  │   ├── EntropyUnavailable    - OS random source failed               │
//! │  │   └── KeyGenerationFailed   - Key pair generation failed            │
//! │  │                                                                      │
//! │  ├── Input Errors                                                      │
//! │  │   ├── InvalidConfig         - Configuration rejected                │
//! │  │   └── InvalidInput          - Caller-supplied value rejected        │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - AEAD/RSA encryption failed            │
//! │  │   ├── DecryptionFailed      - Tag mismatch or malformed ciphertext  │
//! │  │   └── InvalidKey            - Key bytes could not be parsed         │
//! │  │                                                                      │
//! │  ├── Vault Errors                                                      │
//! │  │   ├── VaultError            - Secure store backend failed           │
//! │  │   └── SecretNotFound        - No secret under the given key         │
//! │  │                                                                      │
//! │  ├── Authentication Errors                                             │
//! │  │   ├── AuthUnavailable       - Requested mode not on this device     │
//! │  │   ├── AuthCancelled         - User dismissed the challenge          │
//! │  │   └── AuthFailed            - Challenge not passed                  │
//! │  │                                                                      │
//! │  ├── Transport Errors (recoverable)                                    │
//! │  │   ├── NotConnected          - Circuit not established               │
//! │  │   ├── InvalidUrl            - URL could not be parsed               │
//! │  │   ├── BootstrapTimeout      - Attempts exhausted                    │
//! │  │   ├── BootstrapFailed       - Daemon reported an error              │
//! │  │   ├── ControlAuthFailed     - Control port rejected credentials     │
//! │  │   ├── DaemonFailed          - Daemon could not be launched          │
//! │  │   └── Http                  - Request through the proxy failed      │
//! │  │                                                                      │
//! │  └── Protocol Errors (recoverable)                                     │
//! │      ├── ServerRejected        - success=false or missing              │
//! │      ├── MalformedResponse     - Response did not parse                │
//! │      └── NotLoggedIn           - Operation needs a current user        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Across the FFI boundary
//!
//! ```text
//!  Result<T, Error>  ──────►  code + message  ──────►  host error object
//!  Err(Error::NotConnected)  →  { code: 600, message: "..." }
//! ```

use thiserror::Error;

/// Result type alias for HushPost Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for HushPost Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Environment Errors (100-199)
    // ========================================================================

    /// The platform random source could not produce bytes
    #[error("Secure random source unavailable")]
    EntropyUnavailable,

    /// Asymmetric key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    // ========================================================================
    // Input Errors (200-299)
    // ========================================================================

    /// Configuration was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied value was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // ========================================================================
    // Vault Errors (400-499)
    // ========================================================================

    /// Secure store backend failure
    #[error("Vault error: {0}")]
    VaultError(String),

    /// Nothing stored under the requested key
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    // ========================================================================
    // Authentication Errors (500-599)
    // ========================================================================

    /// The requested authentication mode is not available on this device
    #[error("Authentication unavailable: {0}")]
    AuthUnavailable(String),

    /// The user dismissed the challenge
    #[error("Authentication cancelled by user")]
    AuthCancelled,

    /// The user did not pass the challenge
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // ========================================================================
    // Transport Errors (600-699)
    // ========================================================================

    /// Request attempted while the circuit is not established
    #[error("Tor is not connected")]
    NotConnected,

    /// Request URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Bootstrap did not finish within the configured attempts
    #[error("Tor bootstrap timed out after {attempts} attempts")]
    BootstrapTimeout {
        /// Number of polls performed
        attempts: u32,
    },

    /// Bootstrap reported an error
    #[error("Tor bootstrap failed: {0}")]
    BootstrapFailed(String),

    /// The control port rejected authentication
    #[error("Tor control authentication failed: {0}")]
    ControlAuthFailed(String),

    /// The daemon process could not be launched or exited
    #[error("Tor daemon failed: {0}")]
    DaemonFailed(String),

    /// HTTP request through the proxy failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error on a local socket or process pipe
    #[error("I/O error: {0}")]
    Io(String),

    // ========================================================================
    // Protocol Errors (700-799)
    // ========================================================================

    /// The server answered with success=false or no success flag
    #[error("{0}")]
    ServerRejected(String),

    /// The response did not decrypt or parse
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Operation requires a logged-in user
    #[error("No user is logged in")]
    NotLoggedIn,

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Core has not been initialized
    #[error("HushPost Core has not been initialized. Call hushpost_init() first.")]
    NotInitialized,
}

/// Coarse grouping used by hosts to pick a recovery path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Random source or key generation; abort the operation chain
    Environment,
    /// Bad configuration or caller input
    Input,
    /// Cryptographic failure
    Crypto,
    /// Secure storage failure
    Vault,
    /// User presence challenge
    Authentication,
    /// Onion transport
    Transport,
    /// Remote protocol
    Protocol,
    /// Bug or lifecycle misuse
    Internal,
}

impl Error {
    /// Get the error code for FFI
    ///
    /// Error codes are organized by category:
    /// - 100-199: Environment
    /// - 200-299: Input
    /// - 300-399: Crypto
    /// - 400-499: Vault
    /// - 500-599: Authentication
    /// - 600-699: Transport
    /// - 700-799: Protocol
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::EntropyUnavailable => 100,
            Error::KeyGenerationFailed(_) => 101,

            Error::InvalidConfig(_) => 200,
            Error::InvalidInput(_) => 201,

            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,
            Error::InvalidKey(_) => 302,
            Error::SerializationError(_) => 303,
            Error::DeserializationError(_) => 304,

            Error::VaultError(_) => 400,
            Error::SecretNotFound(_) => 401,

            Error::AuthUnavailable(_) => 500,
            Error::AuthCancelled => 501,
            Error::AuthFailed(_) => 502,

            Error::NotConnected => 600,
            Error::InvalidUrl(_) => 601,
            Error::BootstrapTimeout { .. } => 602,
            Error::BootstrapFailed(_) => 603,
            Error::ControlAuthFailed(_) => 604,
            Error::DaemonFailed(_) => 605,
            Error::Http(_) => 606,
            Error::Io(_) => 607,

            Error::ServerRejected(_) => 700,
            Error::MalformedResponse(_) => 701,
            Error::NotLoggedIn => 702,

            Error::Internal(_) => 900,
            Error::NotInitialized => 901,
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            100..=199 => ErrorCategory::Environment,
            200..=299 => ErrorCategory::Input,
            300..=399 => ErrorCategory::Crypto,
            400..=499 => ErrorCategory::Vault,
            500..=599 => ErrorCategory::Authentication,
            600..=699 => ErrorCategory::Transport,
            700..=799 => ErrorCategory::Protocol,
            _ => ErrorCategory::Internal,
        }
    }

    /// Environment faults; the host should fail the launch sequence
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Environment
    }

    /// Check if this error is recoverable
    ///
    /// Transport faults clear after a successful `start()`; protocol faults
    /// may succeed on a later attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Protocol
        )
    }

    /// Check if this error requires user action
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::AuthUnavailable(_)
                | Error::AuthCancelled
                | Error::AuthFailed(_)
                | Error::InvalidInput(_)
                | Error::NotLoggedIn
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Error::InvalidUrl(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }
}

// ============================================================================
// FFI ERROR REPRESENTATION
// ============================================================================

/// FFI-friendly error representation
#[derive(Debug, Clone)]
#[repr(C)]
pub struct FfiError {
    /// Numeric error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the error is recoverable
    pub recoverable: bool,
}

impl From<Error> for FfiError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::EntropyUnavailable.code(), 100);
        assert_eq!(Error::InvalidInput("x".into()).code(), 201);
        assert_eq!(Error::DecryptionFailed("x".into()).code(), 301);
        assert_eq!(Error::VaultError("x".into()).code(), 400);
        assert_eq!(Error::AuthCancelled.code(), 501);
        assert_eq!(Error::NotConnected.code(), 600);
        assert_eq!(Error::ServerRejected("x".into()).code(), 700);
        assert_eq!(Error::Internal("x".into()).code(), 900);
    }

    #[test]
    fn test_categories() {
        assert!(Error::EntropyUnavailable.is_fatal());
        assert!(Error::KeyGenerationFailed("x".into()).is_fatal());
        assert!(!Error::NotConnected.is_fatal());
        assert_eq!(
            Error::BootstrapTimeout { attempts: 60 }.category(),
            ErrorCategory::Transport
        );
        assert_eq!(Error::NotLoggedIn.category(), ErrorCategory::Protocol);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::NotConnected.is_recoverable());
        assert!(Error::InvalidUrl("x".into()).is_recoverable());
        assert!(Error::ServerRejected("x".into()).is_recoverable());
        assert!(!Error::EntropyUnavailable.is_recoverable());
        assert!(!Error::DecryptionFailed("x".into()).is_recoverable());
    }

    #[test]
    fn test_auth_errors_are_distinct() {
        let unavailable = Error::AuthUnavailable("no biometrics".into());
        let cancelled = Error::AuthCancelled;
        assert_ne!(unavailable.code(), cancelled.code());
        assert!(unavailable.requires_user_action());
        assert!(cancelled.requires_user_action());
    }

    #[test]
    fn test_server_rejection_displays_message_verbatim() {
        let err = Error::ServerRejected("Username taken".into());
        assert_eq!(err.to_string(), "Username taken");
    }

    #[test]
    fn test_ffi_error_conversion() {
        let err = Error::BootstrapTimeout { attempts: 60 };
        let ffi_err: FfiError = err.into();

        assert_eq!(ffi_err.code, 602);
        assert!(ffi_err.message.contains("60"));
        assert!(ffi_err.recoverable);
    }
}
