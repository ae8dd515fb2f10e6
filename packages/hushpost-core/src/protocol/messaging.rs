//! # Messaging
//!
//! Send, fetch, and group operations, plus the end-to-end content layer.
//!
//! Two independent layers protect a message:
//!
//! ```text
//!  text ──► seal_for_recipient (chunked RSA, recipient key) ──► encrypted_content
//!        └► sign_content (RSA/SHA-256, sender key)          ──► signature
//!
//!  Message record ──► transport envelope (fresh AES key per request) ──► server
//! ```
//!
//! The server sees `encrypted_content` only as an opaque string.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

use super::client::ProtocolClient;
use super::identity::Session;
use super::models::{dedup_members, Group, Message, MessageKind, MessageTarget};
use super::reply::{GroupRecord, MessageRecord};
use crate::crypto::{
    asymmetric_decrypt, asymmetric_encrypt, public_key_from_base64, sign, verify, RsaKeyPair,
    RsaPrivateKey, Signature,
};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;
use crate::vault::CredentialVault;

// ============================================================================
// END-TO-END CONTENT
// ============================================================================

/// Encrypt `text` for the holder of `recipient_public_key` (base64 DER)
pub fn seal_for_recipient(text: &str, recipient_public_key: &str) -> Result<String> {
    let key = public_key_from_base64(recipient_public_key)?;
    let sealed = asymmetric_encrypt(text.as_bytes(), &key)
        .ok_or_else(|| Error::EncryptionFailed("content could not be sealed".into()))?;
    Ok(BASE64.encode(sealed))
}

/// Decrypt content sealed by [`seal_for_recipient`]
pub fn open_from_sender(encrypted_content: &str, private_key: &RsaPrivateKey) -> Result<String> {
    let sealed = BASE64
        .decode(encrypted_content)
        .map_err(|e| Error::DecryptionFailed(format!("content encoding: {}", e)))?;
    let plain = asymmetric_decrypt(&sealed, private_key)
        .ok_or_else(|| Error::DecryptionFailed("content could not be opened".into()))?;
    String::from_utf8(plain).map_err(|_| Error::DecryptionFailed("content is not UTF-8".into()))
}

/// Sign content; base64 signature
pub fn sign_content(content: &str, private_key: &RsaPrivateKey) -> Result<String> {
    sign(content.as_bytes(), private_key)
        .map(|s| s.to_base64())
        .ok_or_else(|| Error::EncryptionFailed("signing failed".into()))
}

/// Check a base64 signature against a base64 DER public key; never errors
pub fn verify_content(content: &str, signature: &str, sender_public_key: &str) -> bool {
    let Ok(signature) = Signature::from_base64(signature) else {
        return false;
    };
    let Ok(key) = public_key_from_base64(sender_public_key) else {
        return false;
    };
    verify(&signature, content.as_bytes(), &key)
}

// ============================================================================
// REQUEST RECORDS
// ============================================================================

#[derive(Serialize)]
struct SendRecord<'a> {
    id: &'a str,
    text: &'a str,
    sender_id: &'a str,
    recipient_id: Option<&'a str>,
    group_id: Option<&'a str>,
    timestamp: i64,
    #[serde(rename = "type")]
    kind: &'a str,
    encrypted_content: &'a str,
    signature: Option<&'a str>,
}

#[derive(Serialize)]
struct FetchRecord<'a> {
    user_id: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
struct CreateGroupRecord<'a> {
    name: &'a str,
    members: &'a [String],
    created_by: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
struct InviteRecord<'a> {
    group_id: &'a str,
    user_id: &'a str,
    inviter_id: &'a str,
    timestamp: i64,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Message and group operations for the signed-in user
pub struct MessagingService {
    client: Arc<ProtocolClient>,
    vault: Arc<CredentialVault>,
    session: Session,
    key_pair_tag: String,
}

impl MessagingService {
    /// Service reading the sender from `session`
    pub fn new(
        client: Arc<ProtocolClient>,
        vault: Arc<CredentialVault>,
        session: Session,
        key_pair_tag: impl Into<String>,
    ) -> Self {
        Self {
            client,
            vault,
            session,
            key_pair_tag: key_pair_tag.into(),
        }
    }

    fn current_user_id(&self) -> Result<String> {
        self.session
            .current()
            .map(|u| u.id)
            .ok_or(Error::NotLoggedIn)
    }

    fn own_key_pair(&self) -> Result<RsaKeyPair> {
        self.vault
            .load_key_pair(&self.key_pair_tag)?
            .ok_or_else(|| Error::SecretNotFound(self.key_pair_tag.clone()))
    }

    /// Build a signed message whose content is sealed for `recipient_public_key`
    pub fn compose(
        &self,
        target: MessageTarget,
        text: &str,
        kind: MessageKind,
        recipient_public_key: &str,
    ) -> Result<Message> {
        let sender_id = self.current_user_id()?;
        let encrypted_content = seal_for_recipient(text, recipient_public_key)?;
        let signature = sign_content(&encrypted_content, self.own_key_pair()?.private_key())?;

        let mut message = Message::new(sender_id, target, text, kind, encrypted_content);
        message.signature = Some(signature);
        Ok(message)
    }

    /// Open a received message with this device's private key
    pub fn open(&self, message: &Message) -> Result<String> {
        open_from_sender(&message.encrypted_content, self.own_key_pair()?.private_key())
    }

    /// Deliver a message; returns it as stored by the server
    pub async fn send_message(&self, message: Message) -> Result<Message> {
        self.current_user_id()?;

        let record = SendRecord {
            id: &message.id,
            text: &message.text,
            sender_id: &message.sender_id,
            recipient_id: message.target.recipient_id(),
            group_id: message.target.group_id(),
            timestamp: message.timestamp,
            kind: message.kind.as_str(),
            encrypted_content: &message.encrypted_content,
            signature: message.signature.as_deref(),
        };
        let reply = self
            .client
            .call(&self.client.endpoints().send_message, &record, "Send message failed")
            .await?;

        reply.payload::<MessageRecord>("message")?.merge(message)
    }

    /// Messages waiting for the signed-in user.
    ///
    /// Entries missing required fields are skipped.
    pub async fn fetch_messages(&self) -> Result<Vec<Message>> {
        let user_id = self.current_user_id()?;
        let record = FetchRecord {
            user_id: &user_id,
            timestamp: now_timestamp_millis(),
        };
        let reply = self
            .client
            .call(&self.client.endpoints().fetch_messages, &record, "Fetch messages failed")
            .await?;

        let records: Vec<MessageRecord> = reply.payload("messages")?;
        let total = records.len();
        let now = now_timestamp_millis();
        let messages: Vec<Message> = records
            .into_iter()
            .filter_map(|r| r.into_message(now))
            .collect();
        if messages.len() < total {
            tracing::debug!(skipped = total - messages.len(), "Dropped incomplete messages");
        }
        Ok(messages)
    }

    /// Create a group owned by the signed-in user
    pub async fn create_group(&self, name: &str, members: Vec<String>) -> Result<Group> {
        let created_by = self.current_user_id()?;
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("group name is required".into()));
        }
        let members = dedup_members(members);
        if members.is_empty() {
            return Err(Error::InvalidInput("a group needs at least one member".into()));
        }

        let record = CreateGroupRecord {
            name,
            members: &members,
            created_by: &created_by,
            timestamp: now_timestamp_millis(),
        };
        let reply = self
            .client
            .call(&self.client.endpoints().create_group, &record, "Create group failed")
            .await?;

        reply.payload::<GroupRecord>("group")?.into_group()
    }

    /// Invite `user_id` into `group_id`
    pub async fn invite_to_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let inviter_id = self.current_user_id()?;
        if group_id.is_empty() || user_id.is_empty() {
            return Err(Error::InvalidInput("group and user ids are required".into()));
        }

        let record = InviteRecord {
            group_id,
            user_id,
            inviter_id: &inviter_id,
            timestamp: now_timestamp_millis(),
        };
        self.client
            .call(&self.client.endpoints().invite_to_group, &record, "Invite to group failed")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fixtures::{ALICE, BOB};
    use crate::protocol::identity::tests::{connected_client, fake_server};
    use crate::protocol::models::User;
    use serde_json::json;

    fn signed_in(id: &str) -> Session {
        let session = Session::new();
        session.set(User {
            id: id.into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            public_key: ALICE.public_key_base64().unwrap(),
            avatar: None,
            created_at: 0,
        });
        session
    }

    fn vault_with_alice_keys() -> Arc<CredentialVault> {
        let vault = CredentialVault::in_memory();
        let der = ALICE.private_key_der().unwrap();
        vault.try_store("test.rsa.private", &der).unwrap();
        Arc::new(vault)
    }

    fn server() -> Arc<crate::transport::fakes::RecordingHttp> {
        fake_server(|path, record| match path {
            "/api/send_message" => json!({
                "success": true,
                "message": { "id": "srv-m1", "timestamp": 1_700_000_000_000i64 },
            }),
            "/api/fetch_messages" => json!({
                "success": true,
                "messages": [
                    { "id": "m1", "text": "hi", "sender_id": "u2", "recipient_id": record["user_id"],
                      "encrypted_content": "Y3Q=", "type": "image" },
                    { "id": "m2", "sender_id": "u2" },
                ],
            }),
            "/api/create_group" => json!({
                "success": true,
                "group": {
                    "id": "g1", "name": record["name"], "members": record["members"],
                    "created_by": record["created_by"],
                },
            }),
            "/api/invite_to_group" if record["inviter_id"] == "u1" => json!({ "success": true }),
            _ => json!({ "success": false }),
        })
    }

    async fn service(session: Session) -> MessagingService {
        MessagingService::new(
            connected_client(server()).await,
            vault_with_alice_keys(),
            session,
            "test.rsa",
        )
    }

    #[test]
    fn test_seal_and_open() {
        let bob_key = BOB.public_key_base64().unwrap();
        let sealed = seal_for_recipient("meet at noon", &bob_key).unwrap();
        assert_eq!(open_from_sender(&sealed, BOB.private_key()).unwrap(), "meet at noon");
        assert!(open_from_sender(&sealed, ALICE.private_key()).is_err());
        assert!(open_from_sender("%%%", BOB.private_key()).is_err());
    }

    #[test]
    fn test_sign_and_verify_content() {
        let alice_key = ALICE.public_key_base64().unwrap();
        let sig = sign_content("payload", ALICE.private_key()).unwrap();
        assert!(verify_content("payload", &sig, &alice_key));
        assert!(!verify_content("payloaD", &sig, &alice_key));
        assert!(!verify_content("payload", &sig, &BOB.public_key_base64().unwrap()));
        assert!(!verify_content("payload", "not base64!", &alice_key));
        assert!(!verify_content("payload", &sig, "garbage"));
    }

    #[tokio::test]
    async fn test_compose_and_send() {
        let service = service(signed_in("u1")).await;
        let message = service
            .compose(
                MessageTarget::Direct { recipient_id: "u2".into() },
                "hello bob",
                MessageKind::Text,
                &BOB.public_key_base64().unwrap(),
            )
            .unwrap();
        assert!(verify_content(
            &message.encrypted_content,
            message.signature.as_deref().unwrap(),
            &ALICE.public_key_base64().unwrap()
        ));
        assert_eq!(open_from_sender(&message.encrypted_content, BOB.private_key()).unwrap(), "hello bob");

        let stored = service.send_message(message.clone()).await.unwrap();
        assert_eq!(stored.id, "srv-m1");
        assert_eq!(stored.timestamp, 1_700_000_000_000);
        assert_eq!(stored.text, "hello bob");
        assert_eq!(stored.target, message.target);
        assert_eq!(stored.signature, message.signature);
    }

    #[tokio::test]
    async fn test_fetch_skips_incomplete() {
        let service = service(signed_in("u1")).await;
        let messages = service.fetch_messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].target.recipient_id(), Some("u1"));
        assert_eq!(messages[0].kind, MessageKind::Image);
    }

    #[tokio::test]
    async fn test_groups() {
        let service = service(signed_in("u1")).await;
        let group = service
            .create_group("team", vec!["u2".into(), "u3".into(), "u2".into()])
            .await
            .unwrap();
        assert_eq!(group.members, vec!["u2", "u3"]);
        assert_eq!(group.created_by, "u1");

        assert!(matches!(
            service.create_group(" ", vec!["u2".into()]).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.create_group("team", vec![]).await,
            Err(Error::InvalidInput(_))
        ));

        service.invite_to_group("g1", "u4").await.unwrap();
    }

    #[tokio::test]
    async fn test_requires_login() {
        let service = service(Session::new()).await;
        assert!(matches!(service.fetch_messages().await, Err(Error::NotLoggedIn)));
        assert!(matches!(
            service.invite_to_group("g1", "u4").await,
            Err(Error::NotLoggedIn)
        ));
        assert!(matches!(
            service.compose(
                MessageTarget::Group { group_id: "g1".into() },
                "x",
                MessageKind::Text,
                &BOB.public_key_base64().unwrap()
            ),
            Err(Error::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_invite_rejected_uses_fallback() {
        let service = service(signed_in("someone-else")).await;
        let err = service.invite_to_group("g1", "u4").await.unwrap_err();
        assert_eq!(err.to_string(), "Invite to group failed");
    }
}
