//! Messaging and group dispatch handlers.

use super::dispatcher::{
    core_err, err, json_parse, ok_json, ok_success, optional_str, require_str, to_json, DResult,
};
use crate::context::ClientContext;
use crate::protocol::{Message, MessageKind, MessageTarget};

/// Seal, sign and send a message.
///
/// Args: `{ "recipientId" | "groupId": "...", "text": "...",
///          "recipientPublicKey": "<base64 DER>", "type"?: "text" }`
pub async fn send_message(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let recipient_key = require_str(&data, "recipientPublicKey")?;
    let kind = optional_str(&data, "type")
        .map(MessageKind::from_wire)
        .unwrap_or_default();
    let target = MessageTarget::from_wire(
        optional_str(&data, "recipientId").map(String::from),
        optional_str(&data, "groupId").map(String::from),
    )
    .ok_or_else(|| err(2, "Exactly one of recipientId or groupId is required"))?;

    let messaging = ctx.messaging();
    let message = messaging
        .compose(target, text, kind, recipient_key)
        .map_err(core_err)?;
    let stored = messaging.send_message(message).await.map_err(core_err)?;
    to_json(&stored)
}

pub async fn fetch_messages(ctx: &ClientContext) -> DResult {
    let messages = ctx.messaging().fetch_messages().await.map_err(core_err)?;
    to_json(&messages)
}

/// Decrypt a received message with this device's key.
///
/// Args: `{ "message": <Message> }`
/// Returns: `{ "text": "..." }`
pub fn open_message(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let message: Message = serde_json::from_value(data["message"].clone())
        .map_err(|e| err(2, format!("Invalid message: {}", e)))?;

    let text = ctx.messaging().open(&message).map_err(core_err)?;
    ok_json(serde_json::json!({ "text": text }))
}

/// Args: `{ "name": "...", "members": ["..."] }`
pub async fn create_group(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let name = require_str(&data, "name")?;
    let members: Vec<String> = serde_json::from_value(data["members"].clone())
        .map_err(|_| err(2, "Missing members"))?;

    let group = ctx
        .messaging()
        .create_group(name, members)
        .await
        .map_err(core_err)?;
    to_json(&group)
}

/// Args: `{ "groupId": "...", "userId": "..." }`
pub async fn invite_to_group(ctx: &ClientContext, args: &str) -> DResult {
    let data = json_parse(args)?;
    let group_id = require_str(&data, "groupId")?;
    let user_id = require_str(&data, "userId")?;

    ctx.messaging()
        .invite_to_group(group_id, user_id)
        .await
        .map_err(core_err)?;
    ok_success()
}

#[cfg(test)]
mod tests {
    use crate::crypto::fixtures::BOB;
    use crate::ffi::dispatcher::route;
    use crate::ffi::dispatcher::tests::{parse, test_context};
    use crate::protocol::identity::tests::fake_server;
    use serde_json::json;

    fn server() -> std::sync::Arc<crate::transport::fakes::RecordingHttp> {
        fake_server(|path, record| match path {
            "/api/register" => json!({ "success": true, "user": { "id": "u1" } }),
            "/api/send_message" => json!({ "success": true, "message": { "id": record["id"] } }),
            "/api/fetch_messages" => json!({ "success": true, "messages": [] }),
            "/api/create_group" => json!({
                "success": true,
                "group": {
                    "id": "g1", "name": record["name"], "members": record["members"],
                    "created_by": record["created_by"],
                },
            }),
            _ => json!({ "success": false, "message": "Not allowed" }),
        })
    }

    #[tokio::test]
    async fn test_messaging_through_dispatcher() {
        let ctx = test_context(server());
        route(&ctx, "startTransport", "").await.unwrap();

        let (code, _) = route(&ctx, "fetchMessages", "").await.unwrap_err();
        assert_eq!(code, crate::Error::NotLoggedIn.code());

        let signup = r#"{"username":"alice","email":"alice@example.com","password":"Passw0rd!"}"#;
        route(&ctx, "register", signup).await.unwrap();

        let args = json!({
            "recipientId": "u2",
            "text": "hello",
            "recipientPublicKey": BOB.public_key_base64().unwrap(),
        });
        let sent = parse(route(&ctx, "sendMessage", &args.to_string()).await);
        assert_eq!(sent["sender_id"], "u1");
        assert_eq!(sent["recipient_id"], "u2");
        assert_eq!(sent["type"], "text");
        assert!(sent["signature"].is_string());

        let fetched = parse(route(&ctx, "fetchMessages", "").await);
        assert_eq!(fetched, json!([]));

        let group = parse(route(&ctx, "createGroup", r#"{"name":"team","members":["u2","u3"]}"#).await);
        assert_eq!(group["created_by"], "u1");

        let (code, message) = route(&ctx, "inviteToGroup", r#"{"groupId":"g1","userId":"u4"}"#)
            .await
            .unwrap_err();
        assert_eq!(code, crate::Error::ServerRejected(String::new()).code());
        assert_eq!(message, "Not allowed");
    }

    #[tokio::test]
    async fn test_send_needs_exactly_one_target() {
        let ctx = test_context(server());
        let args = json!({
            "recipientId": "u2",
            "groupId": "g1",
            "text": "hello",
            "recipientPublicKey": "AAAA",
        });
        let (code, _) = route(&ctx, "sendMessage", &args.to_string()).await.unwrap_err();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_open_own_message() {
        let ctx = test_context(server());
        route(&ctx, "startTransport", "").await.unwrap();
        let signup = r#"{"username":"alice","email":"alice@example.com","password":"Passw0rd!"}"#;
        let me = parse(route(&ctx, "register", signup).await);

        // Addressed to ourselves, so our own key opens it
        let args = json!({
            "recipientId": "u1",
            "text": "note to self",
            "recipientPublicKey": me["public_key"],
        });
        let sent = parse(route(&ctx, "sendMessage", &args.to_string()).await);
        let opened = parse(route(&ctx, "openMessage", &json!({ "message": sent }).to_string()).await);
        assert_eq!(opened["text"], "note to self");
    }
}
