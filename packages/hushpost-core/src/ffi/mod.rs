//! # FFI Bindings
//!
//! Foreign Function Interface bindings for the iOS and Android hosts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         FFI ARCHITECTURE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Swift / Kotlin UI                                                      │
//! │         │  hushpost_call(method, args_json)                             │
//! │         │  hushpost_call_async(method, args_json, request_id)           │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  dispatcher: method name ──► handler(ctx, args)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      ClientContext                              │   │
//! │  │  Vault │ Transport │ Identity │ Messaging                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼  events: transport_state, call_result                         │
//! │  hushpost_register_event_callback                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Nothing panics across the boundary. Every call returns an `FfiResult`
//! with the stable numeric code from [`crate::Error::code`] and a message;
//! argument problems use `1` (invalid JSON) and `2` (missing or invalid
//! field), unknown methods `404`.

mod types;

#[cfg(feature = "ffi")]
mod state;

#[cfg(feature = "ffi")]
mod events;

#[cfg(feature = "ffi")]
mod host;

#[cfg(feature = "ffi")]
mod dispatcher;

#[cfg(feature = "ffi")]
mod dispatch_crypto;

#[cfg(feature = "ffi")]
mod dispatch_identity;

#[cfg(feature = "ffi")]
mod dispatch_messaging;

#[cfg(feature = "ffi")]
mod dispatch_secure_store;

#[cfg(feature = "ffi")]
mod dispatch_transport;

#[cfg(feature = "ffi")]
mod c_api;

pub use types::*;

#[cfg(feature = "ffi")]
pub use c_api::*;

#[cfg(feature = "ffi")]
pub use dispatcher::route;

#[cfg(feature = "ffi")]
pub use events::hushpost_register_event_callback;

#[cfg(feature = "ffi")]
pub use host::{hushpost_register_auth_callbacks, HostAuthenticator};
