//! Transport dispatch handlers.

use super::dispatcher::{core_err, err, json_parse, ok_json, optional_str, require_str, DResult};
use crate::context::ClientContext;

pub async fn start_transport(ctx: &ClientContext) -> DResult {
    let state = ctx.transport().start().await.map_err(core_err)?;
    ok_json(serde_json::json!({ "state": state }))
}

pub async fn stop_transport(ctx: &ClientContext) -> DResult {
    ctx.transport().stop().await;
    ok_json(serde_json::json!({ "state": ctx.transport().state() }))
}

pub fn is_transport_connected(ctx: &ClientContext) -> DResult {
    ok_json(serde_json::json!({ "connected": ctx.transport().is_connected() }))
}

pub fn transport_state(ctx: &ClientContext) -> DResult {
    ok_json(serde_json::json!({ "state": ctx.transport().state() }))
}

/// Send a raw body to a server path over the circuit.
///
/// Args: `{ "endpoint": "/api/...", "data": "...", "method"?: "POST" }`
/// Returns: `{ "response": "..." }`
pub async fn send_through_tor(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let endpoint = require_str(&data, "endpoint")?;
    let body = require_str(&data, "data")?;
    let method = optional_str(&data, "method").unwrap_or("POST");

    let url = ctx.config().protocol.url_for(endpoint);
    let response = ctx
        .transport()
        .dispatch(method, &url, Some(body.as_bytes().to_vec()), Vec::new())
        .await
        .map_err(core_err)?;

    let text = String::from_utf8(response)
        .map_err(|_| err(701, "Could not parse response"))?;
    ok_json(serde_json::json!({ "response": text }))
}
