//! Dispatch handlers for the credential vault.
//!
//! Exposes secret custody, key pairs, presence checks and integrity
//! attestation through the generic dispatcher so the UI can use them
//! without additional Swift/Kotlin code.

use super::dispatcher::{core_err, err, json_parse, ok_json, ok_success, require_str, DResult};
use crate::context::ClientContext;
use crate::vault::{AuthMode, IntegrityReport};

/// Store a UTF-8 string value in secure storage.
///
/// Args: `{ "key": "...", "value": "..." }`
/// Returns: `{ "success": bool }`
pub fn store_secret(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let key = require_str(&data, "key")?;
    let value = require_str(&data, "value")?;

    ok_json(serde_json::json!({ "success": ctx.vault().store(key, value.as_bytes()) }))
}

/// Retrieve a UTF-8 string value from secure storage.
///
/// Args: `{ "key": "..." }`
/// Returns: `{ "value": "..." }` or `{ "value": null }` if not found.
pub fn retrieve_secret(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let key = require_str(&data, "key")?;

    match ctx.vault().retrieve(key) {
        Some(bytes) => {
            let value = std::str::from_utf8(&bytes)
                .map_err(|e| err(400, format!("Secret is not valid UTF-8: {}", e)))?;
            ok_json(serde_json::json!({ "value": value }))
        }
        None => ok_json(serde_json::json!({ "value": null })),
    }
}

/// Delete a key from secure storage.
///
/// Args: `{ "key": "..." }`
/// Returns: `{ "deleted": true/false }`
pub fn delete_secret(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let key = require_str(&data, "key")?;

    ok_json(serde_json::json!({ "deleted": ctx.vault().delete(key) }))
}

/// Seal a JSON value under a fresh key and keep both in the vault.
///
/// Args: `{ "key": "...", "data": <any JSON> }`
pub fn encrypt_data(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let key = require_str(&data, "key")?;
    let payload = data.get("data").ok_or_else(|| err(2, "Missing data"))?;

    let bytes = zeroize::Zeroizing::new(payload.to_string().into_bytes());
    ctx.vault().encrypt_and_store(key, &bytes).map_err(core_err)?;
    ok_success()
}

/// Open a value stored by `encryptData`.
///
/// Args: `{ "key": "..." }`
/// Returns: `{ "data": <JSON> }` or `{ "data": null }` if not found.
pub fn decrypt_data(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let key = require_str(&data, "key")?;

    match ctx.vault().retrieve_and_decrypt(key).map_err(core_err)? {
        Some(plain) => {
            let value: serde_json::Value = serde_json::from_slice(&plain)
                .map_err(|e| err(304, format!("Stored data is not JSON: {}", e)))?;
            ok_json(serde_json::json!({ "data": value }))
        }
        None => ok_json(serde_json::json!({ "data": null })),
    }
}

/// Generate the user's key pair; the private half never leaves the vault.
///
/// Returns: `{ "publicKey": "<base64 DER>" }`
pub async fn generate_user_keys(ctx: &ClientContext) -> DResult {
    let vault = ctx.vault().clone();
    let tag = ctx.config().vault.key_pair_tag.clone();
    let pair = tokio::task::spawn_blocking(move || vault.generate_key_pair(&tag))
        .await
        .map_err(|e| err(900, format!("Key generation task: {}", e)))?
        .map_err(core_err)?;

    ok_json(serde_json::json!({ "publicKey": pair.public_key_base64().map_err(core_err)? }))
}

/// Require user presence.
///
/// Args: `{ "reason": "...", "mode"?: "biometric" | "passcode_or_biometric" }`
pub async fn authenticate(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let reason = require_str(&data, "reason")?;
    let mode = match data.get("mode") {
        Some(m) => serde_json::from_value::<AuthMode>(m.clone())
            .map_err(|e| err(2, format!("Invalid mode: {}", e)))?,
        None => AuthMode::PasscodeOrBiometric,
    };

    ctx.vault().authenticate(reason, mode).await.map_err(core_err)?;
    ok_json(serde_json::json!({ "authenticated": true }))
}

/// Run integrity attestation, folding in checks only the host can make.
///
/// Args: `{ "report"?: { "emulator": bool, "debugger": bool, ... } }`
/// Returns: `{ "compromised": bool, "verdict": ... }`
pub fn is_device_compromised(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let host = match data.get("report") {
        Some(r) => serde_json::from_value::<IntegrityReport>(r.clone())
            .map_err(|e| err(2, format!("Invalid report: {}", e)))?,
        None => IntegrityReport::default(),
    };

    let verdict = ctx.vault().attest_integrity_with(host);
    ok_json(serde_json::json!({
        "compromised": verdict.is_tampered(),
        "verdict": verdict,
    }))
}
