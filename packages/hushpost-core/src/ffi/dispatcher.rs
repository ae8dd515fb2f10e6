//! # FFI Dispatcher
//!
//! JSON-RPC style dispatcher that routes method names to core operations.
//! Called from `hushpost_call(method, args)` and `hushpost_call_async` in
//! c_api.rs.
//!
//! Handler implementations live in domain sub-modules:
//!   - `dispatch_crypto`       hashing helpers
//!   - `dispatch_secure_store` secrets, key pairs, presence, integrity
//!   - `dispatch_transport`    onion transport lifecycle and raw dispatch
//!   - `dispatch_identity`     account operations
//!   - `dispatch_messaging`    messages and groups
//!
//! Returns `Ok(json_string)` on success, `Err((error_code, message))` on failure.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::state::context;
use crate::context::ClientContext;

/// `Ok(json)` or `Err((code, message))`
pub type DResult = Result<String, (i32, String)>;

// ============================================================================
// HELPERS  (pub(super) so domain modules can use them)
// ============================================================================

pub fn err(code: i32, msg: impl ToString) -> (i32, String) {
    (code, msg.to_string())
}

/// Core error with its stable code
pub fn core_err(e: crate::Error) -> (i32, String) {
    (e.code(), e.to_string())
}

pub fn json_parse(args: &str) -> Result<serde_json::Value, (i32, String)> {
    if args.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(args).map_err(|e| err(1, format!("Invalid JSON: {}", e)))
}

pub fn require_str<'a>(data: &'a serde_json::Value, field: &str) -> Result<&'a str, (i32, String)> {
    data[field].as_str().ok_or_else(|| err(2, format!("Missing {}", field)))
}

pub fn optional_str<'a>(data: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    data[field].as_str()
}

/// Optional base64 field, decoded
pub fn optional_b64(data: &serde_json::Value, field: &str) -> Result<Option<Vec<u8>>, (i32, String)> {
    optional_str(data, field)
        .map(|s| BASE64.decode(s).map_err(|e| err(2, format!("Invalid {}: {}", field, e))))
        .transpose()
}

pub fn ok_json(v: serde_json::Value) -> DResult {
    Ok(v.to_string())
}

pub fn ok_success() -> DResult {
    Ok(r#"{"success":true}"#.to_string())
}

pub fn to_json<T: serde::Serialize>(value: &T) -> DResult {
    serde_json::to_string(value).map_err(|e| err(303, e))
}

// ============================================================================
// MAIN DISPATCHER
// ============================================================================

use super::dispatch_crypto;
use super::dispatch_identity;
use super::dispatch_messaging;
use super::dispatch_secure_store;
use super::dispatch_transport;

/// Route `method` against the initialized client
pub async fn dispatch(method: &str, args: &str) -> DResult {
    let ctx = context().map_err(core_err)?;
    route(&ctx, method, args).await
}

/// Route `method` against `ctx`
pub async fn route(ctx: &ClientContext, method: &str, args: &str) -> DResult {
    tracing::debug!("Dispatch {}", method);
    match method {
        // ── Crypto ──────────────────────────────────────────────────
        "hashPassword" => dispatch_crypto::hash_password(args),
        "secureHash" => dispatch_crypto::secure_hash(args),
        "verifyHash" => dispatch_crypto::verify_hash(args),

        // ── Secure Store ───────────────────────────────────────────
        "storeSecret" => dispatch_secure_store::store_secret(ctx, args),
        "retrieveSecret" => dispatch_secure_store::retrieve_secret(ctx, args),
        "deleteSecret" => dispatch_secure_store::delete_secret(ctx, args),
        "encryptData" => dispatch_secure_store::encrypt_data(ctx, args),
        "decryptData" => dispatch_secure_store::decrypt_data(ctx, args),
        "generateUserKeys" => dispatch_secure_store::generate_user_keys(ctx).await,
        "authenticate" => dispatch_secure_store::authenticate(ctx, args).await,
        "isDeviceCompromised" => dispatch_secure_store::is_device_compromised(ctx, args),

        // ── Transport ──────────────────────────────────────────────
        "startTransport" => dispatch_transport::start_transport(ctx).await,
        "stopTransport" => dispatch_transport::stop_transport(ctx).await,
        "isTransportConnected" => dispatch_transport::is_transport_connected(ctx),
        "transportState" => dispatch_transport::transport_state(ctx),
        "sendThroughTor" => dispatch_transport::send_through_tor(ctx, args).await,

        // ── Identity ───────────────────────────────────────────────
        "register" => dispatch_identity::register(ctx, args).await,
        "login" => dispatch_identity::login(ctx, args).await,
        "updateProfile" => dispatch_identity::update_profile(ctx, args).await,
        "logout" => dispatch_identity::logout(ctx),
        "currentUser" => dispatch_identity::current_user(ctx),

        // ── Messaging ──────────────────────────────────────────────
        "sendMessage" => dispatch_messaging::send_message(ctx, args).await,
        "fetchMessages" => dispatch_messaging::fetch_messages(ctx).await,
        "openMessage" => dispatch_messaging::open_message(ctx, args),
        "createGroup" => dispatch_messaging::create_group(ctx, args).await,
        "inviteToGroup" => dispatch_messaging::invite_to_group(ctx, args).await,

        "version" => ok_json(serde_json::json!({ "version": crate::version() })),

        _ => Err(err(404, format!("Unknown method: {}", method))),
    }
}
