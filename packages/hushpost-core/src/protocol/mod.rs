//! # Secure Messaging Protocol
//!
//! Account, message and group operations against the fixed server
//! endpoints, every one of them sealed and sent through the anonymizing
//! transport.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PROTOCOL LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  IdentityService        register / login / update_profile / logout    │
//! │  MessagingService       send / fetch / create_group / invite          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ProtocolClient::call   record ─► JSON ─► envelope ─► POST             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  AnonymizingTransport   refuses to send unless Connected               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reply Handling
//!
//! A reply is accepted only with `success: true`. Anything else surfaces as
//! [`Error::ServerRejected`](crate::Error::ServerRejected) with the server's
//! message, or an operation-specific fallback such as `"Login failed"`.
//! Fields the server leaves out of a returned record are filled from the
//! request ([`prefer_server`]).

pub mod client;
pub mod envelope;
pub mod identity;
pub mod messaging;
pub mod models;
pub mod reply;

pub use client::{ProtocolClient, ENVELOPE_CONTENT_TYPE};
pub use envelope::{open_request, seal_request, PendingReply, ReplySealer, SealedEnvelope, ENVELOPE_VERSION};
pub use identity::{IdentityService, Session, SESSION_KEY};
pub use messaging::{open_from_sender, seal_for_recipient, sign_content, verify_content, MessagingService};
pub use models::{
    sanitize_username, validate_email, validate_password, validate_username, Group, Message,
    MessageKind, MessageTarget, User, MIN_PASSWORD_LEN,
};
pub use reply::{prefer_server, Reply};
