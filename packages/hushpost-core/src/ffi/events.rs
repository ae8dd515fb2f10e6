//! # FFI Event System
//!
//! Pushes events from Rust to Swift/Kotlin via a registered C callback.
//!
//! | Event | When | Payload |
//! |-------|------|---------|
//! | `transport_state` | Every connection state change | `{ "state": "connected" }` |
//! | `call_result` | A `hushpost_call_async` request finished | `{ "request_id", "success", "data" }` or `{ "request_id", "success", "error_code", "error" }` |
//!
//! The callback runs on a runtime worker thread; hosts hop to their UI
//! thread themselves.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::OnceLock;

use serde_json::{json, Value};

use super::dispatcher::DResult;
use super::state::EventCallback;
use crate::transport::ConnectionState;

static EVENT_CB: OnceLock<EventCallback> = OnceLock::new();

/// Register the event callback. Only the first registration counts.
#[no_mangle]
pub extern "C" fn hushpost_register_event_callback(
    cb: extern "C" fn(event_type: *const c_char, data: *const c_char),
) {
    let _ = EVENT_CB.set(cb);
}

/// Whether a host callback is registered
pub(crate) fn has_event_callback() -> bool {
    EVENT_CB.get().is_some()
}

// ============================================================================
// EVENTS
// ============================================================================

/// Something the host is told about without asking
pub(crate) enum Event {
    TransportState(ConnectionState),
    CallResult { request_id: u64, result: DResult },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::TransportState(_) => "transport_state",
            Event::CallResult { .. } => "call_result",
        }
    }

    fn payload(self) -> Value {
        match self {
            Event::TransportState(state) => json!({ "state": state }),
            Event::CallResult { request_id, result: Ok(data) } => {
                // Handlers answer with JSON; anything else is passed as a string
                let data = serde_json::from_str::<Value>(&data).unwrap_or(Value::String(data));
                json!({ "request_id": request_id, "success": true, "data": data })
            }
            Event::CallResult { request_id, result: Err((code, message)) } => json!({
                "request_id": request_id,
                "success": false,
                "error_code": code,
                "error": message,
            }),
        }
    }
}

/// Deliver `event` to the host, if one is listening
pub(crate) fn emit(event: Event) {
    let Some(cb) = EVENT_CB.get() else {
        return;
    };
    let name = event.name();
    let payload = event.payload().to_string();
    match (CString::new(name), CString::new(payload)) {
        (Ok(name), Ok(payload)) => cb(name.as_ptr(), payload.as_ptr()),
        _ => tracing::warn!("Dropped {} event with an interior NUL", name),
    }
}
