//! Server reply schema and the merge policy for echoed fields.
//!
//! Every decrypted reply is a JSON object with a `success` flag. On failure
//! `message` carries the server's explanation; on a successful send it
//! carries the stored message object instead, so it is kept untyped until
//! the caller asks for it.
//!
//! Records the server returns may omit fields the client already knows.
//! [`prefer_server`] is the single rule for filling those gaps: the server's
//! value wins when present, otherwise the value from the request is echoed.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::models::{Group, Message, MessageKind, MessageTarget, User};
use crate::error::{Error, Result};

/// Server value when present, else the value we sent
pub fn prefer_server<T>(server: Option<T>, request: T) -> T {
    server.unwrap_or(request)
}

/// Decrypted reply body
#[derive(Debug, Deserialize)]
pub struct Reply {
    /// Absent counts as failure
    #[serde(default)]
    pub success: Option<bool>,
    /// Error text, or the stored message on a successful send
    #[serde(default)]
    pub message: Option<Value>,
    /// Everything else
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Reply {
    /// Parse a decrypted body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::MalformedResponse(format!("reply is not a JSON object: {}", e)))
    }

    /// Error text supplied by the server, if it sent a string
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_ref().and_then(Value::as_str)
    }

    /// `Ok(self)` only for `success: true`; otherwise the server's message or `fallback`
    pub fn into_result(self, fallback: &str) -> Result<Self> {
        if self.success == Some(true) {
            return Ok(self);
        }
        let message = self
            .error_message()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string();
        Err(Error::ServerRejected(message))
    }

    /// Typed payload under `field`
    pub fn payload<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        let value = match field {
            "message" => self.message.as_ref().filter(|v| v.is_object()),
            _ => self.fields.get(field),
        }
        .ok_or_else(|| Error::MalformedResponse(format!("reply has no {}", field)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", field, e)))
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// `user` object in identity replies
#[derive(Debug, Default, Deserialize)]
pub struct UserRecord {
    /// Required
    pub id: Option<String>,
    /// Handle
    pub username: Option<String>,
    /// Email
    pub email: Option<String>,
    /// Public key, base64 DER
    pub public_key: Option<String>,
    /// Avatar
    pub avatar: Option<String>,
}

impl UserRecord {
    /// Fill gaps from what the client sent; the id must come from the server
    pub fn merge(self, sent: User) -> Result<User> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedResponse("user has no id".into()))?;
        Ok(User {
            id,
            username: prefer_server(self.username, sent.username),
            email: prefer_server(self.email, sent.email),
            public_key: prefer_server(self.public_key, sent.public_key),
            avatar: self.avatar.or(sent.avatar),
            created_at: sent.created_at,
        })
    }
}

/// Message object in send/fetch replies
#[derive(Debug, Default, Deserialize)]
pub struct MessageRecord {
    /// Message id
    pub id: Option<String>,
    /// Preview text
    pub text: Option<String>,
    /// Author
    pub sender_id: Option<String>,
    /// Direct recipient
    pub recipient_id: Option<String>,
    /// Group
    pub group_id: Option<String>,
    /// Unix milliseconds
    pub timestamp: Option<i64>,
    /// Wire kind name
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Sealed content
    pub encrypted_content: Option<String>,
    /// Signature
    pub signature: Option<String>,
}

impl MessageRecord {
    /// Fill gaps from the message that was sent; the id must come from the server
    pub fn merge(self, sent: Message) -> Result<Message> {
        let id = self
            .id
            .ok_or_else(|| Error::MalformedResponse("message has no id".into()))?;
        let target = MessageTarget::from_wire(self.recipient_id, self.group_id);
        Ok(Message {
            id,
            text: prefer_server(self.text, sent.text),
            sender_id: prefer_server(self.sender_id, sent.sender_id),
            target: prefer_server(target, sent.target),
            timestamp: prefer_server(self.timestamp, sent.timestamp),
            kind: prefer_server(self.kind.as_deref().map(MessageKind::from_wire), sent.kind),
            encrypted_content: prefer_server(self.encrypted_content, sent.encrypted_content),
            signature: self.signature.or(sent.signature),
        })
    }

    /// Strict conversion for fetched messages.
    ///
    /// `None` when id, sender, text, content, or a single target is missing.
    pub fn into_message(self, now_millis: i64) -> Option<Message> {
        Some(Message {
            id: self.id?,
            text: self.text?,
            sender_id: self.sender_id?,
            target: MessageTarget::from_wire(self.recipient_id, self.group_id)?,
            timestamp: self.timestamp.unwrap_or(now_millis),
            kind: self.kind.as_deref().map(MessageKind::from_wire).unwrap_or_default(),
            encrypted_content: self.encrypted_content?,
            signature: self.signature,
        })
    }
}

/// `group` object in create-group replies
#[derive(Debug, Default, Deserialize)]
pub struct GroupRecord {
    /// Group id
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Member ids
    pub members: Option<Vec<String>>,
    /// Creator
    pub created_by: Option<String>,
    /// Unix milliseconds
    pub created_at: Option<i64>,
}

impl GroupRecord {
    /// Strict conversion; id, name, members and creator are required
    pub fn into_group(self) -> Result<Group> {
        let missing = |what: &str| Error::MalformedResponse(format!("group has no {}", what));
        Group::new(
            self.id.ok_or_else(|| missing("id"))?,
            self.name.ok_or_else(|| missing("name"))?,
            self.members.ok_or_else(|| missing("members"))?,
            self.created_by.ok_or_else(|| missing("created_by"))?,
            self.created_at.map(|ms| ms / 1000),
        )
        .map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent_user() -> User {
        User {
            id: String::new(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            public_key: "cHVi".into(),
            avatar: None,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_prefer_server() {
        assert_eq!(prefer_server(Some("server"), "request"), "server");
        assert_eq!(prefer_server(None, "request"), "request");
    }

    #[test]
    fn test_success_flag() {
        assert!(Reply::parse(br#"{"success":true}"#).unwrap().into_result("x").is_ok());

        let err = Reply::parse(br#"{"success":false,"message":"Email taken"}"#)
            .unwrap()
            .into_result("Registration failed")
            .unwrap_err();
        assert_eq!(err.to_string(), "Email taken");

        let err = Reply::parse(br#"{"user":{}}"#)
            .unwrap()
            .into_result("Registration failed")
            .unwrap_err();
        assert!(matches!(err, Error::ServerRejected(ref m) if m == "Registration failed"));

        let err = Reply::parse(br#"{"success":"yes"}"#);
        assert!(matches!(err, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(Reply::parse(b"[1,2]"), Err(Error::MalformedResponse(_))));
        assert!(matches!(Reply::parse(b"\xff"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_user_merge() {
        let reply = Reply::parse(br#"{"success":true,"user":{"id":"u1","email":"ALICE@example.com"}}"#)
            .unwrap();
        let user = reply.payload::<UserRecord>("user").unwrap().merge(sent_user()).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "ALICE@example.com");
        assert_eq!(user.username, "alice");
        assert_eq!(user.public_key, "cHVi");
    }

    #[test]
    fn test_user_without_id() {
        let record = UserRecord {
            username: Some("alice".into()),
            ..Default::default()
        };
        assert!(matches!(record.merge(sent_user()), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_message_payload_shares_message_key() {
        let reply = Reply::parse(
            br#"{"success":true,"message":{"id":"m9","timestamp":1700000000123}}"#,
        )
        .unwrap();
        assert!(reply.error_message().is_none());
        let sent = Message::new(
            "u1",
            MessageTarget::Group { group_id: "g1".into() },
            "hi",
            MessageKind::Voice,
            "Y3Q=",
        );
        let merged = reply.payload::<MessageRecord>("message").unwrap().merge(sent).unwrap();
        assert_eq!(merged.id, "m9");
        assert_eq!(merged.timestamp, 1_700_000_000_123);
        assert_eq!(merged.kind, MessageKind::Voice);
        assert_eq!(merged.target.group_id(), Some("g1"));

        let failed = Reply::parse(br#"{"success":true,"message":"queued"}"#).unwrap();
        assert!(failed.payload::<MessageRecord>("message").is_err());
    }

    #[test]
    fn test_fetched_message_strictness() {
        let complete = MessageRecord {
            id: Some("m1".into()),
            text: Some("hi".into()),
            sender_id: Some("u2".into()),
            recipient_id: Some("u1".into()),
            encrypted_content: Some("Y3Q=".into()),
            ..Default::default()
        };
        let message = complete.into_message(42).unwrap();
        assert_eq!(message.timestamp, 42);
        assert_eq!(message.kind, MessageKind::Text);

        let no_target = MessageRecord {
            id: Some("m2".into()),
            text: Some("hi".into()),
            sender_id: Some("u2".into()),
            encrypted_content: Some("Y3Q=".into()),
            ..Default::default()
        };
        assert!(no_target.into_message(42).is_none());
    }

    #[test]
    fn test_group_record() {
        let reply = Reply::parse(
            br#"{"success":true,"group":{"id":"g1","name":"team","members":["u1","u2","u1"],"created_by":"u1","created_at":1700000000000}}"#,
        )
        .unwrap();
        let group = reply.payload::<GroupRecord>("group").unwrap().into_group().unwrap();
        assert_eq!(group.members, vec!["u1", "u2"]);
        assert_eq!(group.created_at, 1_700_000_000);

        let missing = GroupRecord {
            id: Some("g1".into()),
            ..Default::default()
        };
        assert!(missing.into_group().is_err());
    }
}
