//! # C API
//!
//! C-compatible FFI functions for iOS and other native platforms.
//!
//! All functions follow the naming convention: `hushpost_<action>`. Every
//! operation past initialization goes through `hushpost_call` (blocking) or
//! `hushpost_call_async` (result delivered as a `call_result` event).

use std::os::raw::c_char;
use std::sync::Arc;

use super::dispatcher::dispatch;
use super::events::{emit, has_event_callback, Event};
use super::host::HostAuthenticator;
use super::state::{get_runtime, get_state};
use super::types::*;
use crate::config::CoreConfig;
use crate::context::ClientContext;
use crate::error::{Error, Result};
use crate::transport::AnonymizingTransport;
use crate::vault::CredentialVault;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize HushPost Core
///
/// Must be called before any other functions.
///
/// # Arguments
/// * `config_json` - `CoreConfig` as JSON (null for defaults)
///
/// # Returns
/// FfiResult with success/error status
#[no_mangle]
pub unsafe extern "C" fn hushpost_init(config_json: *const c_char) -> FfiResult {
    let config = if config_json.is_null() {
        Ok(CoreConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => CoreConfig::from_json(&json),
            None => return FfiResult::err(201, "Invalid config string".to_string()),
        }
    };

    crate::logging::init_logging(None);
    FfiResult::from_result(config.and_then(init_context).map(|_| r#"{"success":true}"#))
}

fn init_context(config: CoreConfig) -> Result<()> {
    config.validate()?;
    let runtime = get_runtime()?;
    let state = get_state();
    let mut state = state.write();
    if state.context.is_some() {
        return Err(Error::InvalidConfig("Already initialized".into()));
    }

    let _guard = runtime.enter();
    let vault = CredentialVault::platform(&config.vault.service_name)
        .with_authenticator(Arc::new(HostAuthenticator));
    let transport = AnonymizingTransport::new(config.transport.clone())?;
    let context = Arc::new(ClientContext::with_parts(config, Arc::new(vault), transport)?);

    let mut states = context.transport().subscribe();
    state.state_forwarder = Some(runtime.spawn(async move {
        while states.changed().await.is_ok() {
            let current = *states.borrow_and_update();
            emit(Event::TransportState(current));
        }
    }));
    state.context = Some(context);

    tracing::info!("HushPost FFI initialized");
    Ok(())
}

/// Shutdown HushPost Core
///
/// Stops the transport and forgets the current user. `hushpost_init` may be
/// called again afterwards.
#[no_mangle]
pub extern "C" fn hushpost_shutdown() -> FfiResult {
    let runtime = match get_runtime() {
        Ok(rt) => rt,
        Err(e) => return FfiResult::err(e.code(), e.to_string()),
    };

    let (context, forwarder) = {
        let state = get_state();
        let mut state = state.write();
        (state.context.take(), state.state_forwarder.take())
    };

    if let Some(context) = context {
        runtime.block_on(context.shutdown());
    }
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }

    tracing::info!("HushPost FFI shut down");
    FfiResult::ok_empty()
}

/// Get HushPost Core version
#[no_mangle]
pub extern "C" fn hushpost_version() -> *mut c_char {
    into_c_string(crate::version().to_string())
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Run `method` with JSON `args` and wait for the result.
///
/// Must not be called from a thread owned by the core's runtime.
///
/// # Safety
/// `method` and `args` must be valid null-terminated strings or null.
#[no_mangle]
pub unsafe extern "C" fn hushpost_call(method: *const c_char, args: *const c_char) -> FfiResult {
    let Some(method) = cstr_to_string(method) else {
        return FfiResult::err(2, "Missing method".to_string());
    };
    let args = cstr_to_string(args).unwrap_or_default();

    let runtime = match get_runtime() {
        Ok(rt) => rt,
        Err(e) => return FfiResult::err(e.code(), e.to_string()),
    };
    FfiResult::from_dispatch(runtime.block_on(dispatch(&method, &args)))
}

/// Start `method` and return immediately.
///
/// The outcome arrives as a `call_result` event carrying `request_id`.
/// Requires a registered event callback.
///
/// # Safety
/// `method` and `args` must be valid null-terminated strings or null.
#[no_mangle]
pub unsafe extern "C" fn hushpost_call_async(
    method: *const c_char,
    args: *const c_char,
    request_id: u64,
) -> FfiResult {
    let Some(method) = cstr_to_string(method) else {
        return FfiResult::err(2, "Missing method".to_string());
    };
    let args = cstr_to_string(args).unwrap_or_default();

    if !has_event_callback() {
        return FfiResult::err(2, "No event callback registered".to_string());
    }
    let runtime = match get_runtime() {
        Ok(rt) => rt,
        Err(e) => return FfiResult::err(e.code(), e.to_string()),
    };

    runtime.spawn(async move {
        let result = dispatch(&method, &args).await;
        emit(Event::CallResult { request_id, result });
    });
    FfiResult::ok_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn call(method: &str, args: &str) -> (i32, i32, Option<String>, Option<String>) {
        let method = CString::new(method).unwrap();
        let args = CString::new(args).unwrap();
        unsafe {
            let result = hushpost_call(method.as_ptr(), args.as_ptr());
            let out = (
                result.success,
                result.error_code,
                cstr_to_string(result.data),
                cstr_to_string(result.error_message),
            );
            hushpost_free_result(result);
            out
        }
    }

    // Single test: the C API drives process-wide state
    #[test]
    fn test_init_call_shutdown() {
        let (_, code, _, _) = call("version", "");
        assert_eq!(code, Error::NotInitialized.code());

        let result = unsafe { hushpost_init(std::ptr::null()) };
        assert_eq!(result.success, 1);
        unsafe { hushpost_free_result(result) };

        let again = unsafe { hushpost_init(std::ptr::null()) };
        assert_eq!(again.success, 0);
        unsafe { hushpost_free_result(again) };

        let (ok, _, data, _) = call("isTransportConnected", "{}");
        assert_eq!(ok, 1);
        assert_eq!(data.unwrap(), r#"{"connected":false}"#);

        let (ok, code, _, message) = call("nope", "{}");
        assert_eq!((ok, code), (0, 404));
        assert!(message.unwrap().contains("nope"));

        let (ok, code, _, _) = call("sendThroughTor", r#"{"endpoint":"/api/x","data":"d"}"#);
        assert_eq!((ok, code), (0, Error::NotConnected.code()));

        let done = hushpost_shutdown();
        assert_eq!(done.success, 1);
        unsafe { hushpost_free_result(done) };

        let (_, code, _, _) = call("version", "");
        assert_eq!(code, Error::NotInitialized.code());
    }

    #[test]
    fn test_version_string() {
        let ptr = hushpost_version();
        assert_eq!(unsafe { cstr_to_string(ptr) }.unwrap(), crate::version());
        unsafe { hushpost_free_string(ptr) };
    }
}
