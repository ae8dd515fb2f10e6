//! Identity dispatch handlers.

use super::dispatcher::{core_err, json_parse, ok_json, require_str, to_json, DResult};
use crate::context::ClientContext;

/// Args: `{ "username": "...", "email": "...", "password": "..." }`
pub async fn register(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let username = require_str(&data, "username")?;
    let email = require_str(&data, "email")?;
    let password = require_str(&data, "password")?;

    let user = ctx
        .identity()
        .register(username, email, password)
        .await
        .map_err(core_err)?;
    to_json(&user)
}

/// Args: `{ "email": "...", "password": "..." }`
pub async fn login(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let email = require_str(&data, "email")?;
    let password = require_str(&data, "password")?;

    let user = ctx.identity().login(email, password).await.map_err(core_err)?;
    to_json(&user)
}

/// Args: `{ "avatar": "..." | null }`
pub async fn update_profile(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let avatar = data["avatar"].as_str();

    let user = ctx.identity().update_profile(avatar).await.map_err(core_err)?;
    to_json(&user)
}

pub fn logout(ctx: &ClientContext) -> DResult {
    ok_json(serde_json::json!({ "loggedOut": ctx.identity().logout() }))
}

/// The signed-in user, or `null`
pub fn current_user(ctx: &ClientContext) -> DResult {
    to_json(&ctx.identity().current_user())
}
