//! Domain types and input validation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::time::{now_timestamp, now_timestamp_millis};

// ============================================================================
// USER
// ============================================================================

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned id
    pub id: String,
    /// Display handle
    pub username: String,
    /// Sign-in email
    pub email: String,
    /// RSA public key, base64 DER
    pub public_key: String,
    /// Avatar, base64 image data or URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

// ============================================================================
// MESSAGE
// ============================================================================

/// Content type of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// Voice note
    Voice,
    /// Shared location
    Location,
    /// Arbitrary file
    File,
}

impl MessageKind {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::Location => "location",
            MessageKind::File => "file",
        }
    }

    /// Parse a wire name; unknown names read as text
    pub fn from_wire(name: &str) -> Self {
        match name {
            "image" => MessageKind::Image,
            "voice" => MessageKind::Voice,
            "location" => MessageKind::Location,
            "file" => MessageKind::File,
            _ => MessageKind::Text,
        }
    }
}

/// Who a message is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum MessageTarget {
    /// One recipient
    Direct {
        /// Recipient user id
        recipient_id: String,
    },
    /// Every member of a group
    Group {
        /// Group id
        group_id: String,
    },
}

impl MessageTarget {
    /// Build from the two optional wire fields; exactly one must be set
    pub fn from_wire(recipient_id: Option<String>, group_id: Option<String>) -> Option<Self> {
        match (recipient_id, group_id) {
            (Some(recipient_id), None) => Some(MessageTarget::Direct { recipient_id }),
            (None, Some(group_id)) => Some(MessageTarget::Group { group_id }),
            _ => None,
        }
    }

    /// Recipient id for a direct message
    pub fn recipient_id(&self) -> Option<&str> {
        match self {
            MessageTarget::Direct { recipient_id } => Some(recipient_id),
            MessageTarget::Group { .. } => None,
        }
    }

    /// Group id for a group message
    pub fn group_id(&self) -> Option<&str> {
        match self {
            MessageTarget::Group { group_id } => Some(group_id),
            MessageTarget::Direct { .. } => None,
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: String,
    /// Preview text
    pub text: String,
    /// Author user id
    pub sender_id: String,
    /// Direct or group
    #[serde(flatten)]
    pub target: MessageTarget,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Content type
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// End-to-end sealed content, base64
    pub encrypted_content: String,
    /// Sender signature over the content, base64
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Message {
    /// New outbound message with a fresh id and the current time
    pub fn new(
        sender_id: impl Into<String>,
        target: MessageTarget,
        text: impl Into<String>,
        kind: MessageKind,
        encrypted_content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender_id: sender_id.into(),
            target,
            timestamp: now_timestamp_millis(),
            kind,
            encrypted_content: encrypted_content.into(),
            signature: None,
        }
    }
}

// ============================================================================
// GROUP
// ============================================================================

/// A chat group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group id
    pub id: String,
    /// Display name
    pub name: String,
    /// Member ids, unique, in the order they were added
    pub members: Vec<String>,
    /// Unix seconds
    pub created_at: i64,
    /// Creator user id
    pub created_by: String,
}

impl Group {
    /// Build a group, dropping duplicate members; an empty member list is rejected
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        members: Vec<String>,
        created_by: impl Into<String>,
        created_at: Option<i64>,
    ) -> Result<Self> {
        let members = dedup_members(members);
        if members.is_empty() {
            return Err(Error::InvalidInput("a group needs at least one member".into()));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            members,
            created_at: created_at.unwrap_or_else(now_timestamp),
            created_by: created_by.into(),
        })
    }

    /// Membership test
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Append a member; false if already present
    pub fn add_member(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.has_member(&user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }
}

/// Remove duplicates and blanks, keeping first occurrences in order
pub fn dedup_members(members: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    members
        .into_iter()
        .filter(|m| !m.trim().is_empty())
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

// ============================================================================
// VALIDATION
// ============================================================================

const PASSWORD_SPECIALS: &str = "@#$%^&+=!";

fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Username: optional leading `@`, then 3 to 30 of `[A-Za-z0-9_]`
pub fn validate_username(username: &str) -> Result<()> {
    let handle = username.strip_prefix('@').unwrap_or(username);
    if (3..=30).contains(&handle.len()) && handle.chars().all(is_handle_char) {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "username must be 3-30 letters, digits or underscores".into(),
        ))
    }
}

/// Force a handle into shape: `@` prefix, valid characters, 3 to 30 long
pub fn sanitize_username(username: &str) -> String {
    let stripped = username.strip_prefix('@').unwrap_or(username);
    let mut clean: String = stripped.chars().filter(|c| is_handle_char(*c)).collect();
    while clean.len() < 3 {
        clean.push('_');
    }
    clean.truncate(30);
    format!("@{}", clean)
}

/// Basic `local@domain.tld` shape
pub fn validate_email(email: &str) -> Result<()> {
    let shaped = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };
    if shaped && !email.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(Error::InvalidInput("email address is not valid".into()))
    }
}

/// At least 8 characters with a digit, a lowercase and an uppercase letter,
/// and one of `@#$%^&+=!`; no whitespace
pub fn validate_password(password: &str) -> Result<()> {
    let strong = password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
        && !password.chars().any(char::is_whitespace);
    if strong {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "password needs 8+ characters with upper, lower, digit and one of @#$%^&+=!".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("@alice_99").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("@Al!ce"), "@Alce");
        assert_eq!(sanitize_username("a"), "@a__");
        assert_eq!(sanitize_username(&"b".repeat(40)), format!("@{}", "b".repeat(30)));
        assert!(validate_username(&sanitize_username("@x y!")).is_ok());
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("alice example.com").is_err());
    }

    #[test]
    fn test_passwords() {
        assert!(validate_password("Passw0rd!").is_ok());
        assert!(validate_password("password").is_err());
        assert!(validate_password("Passw0rd").is_err());
        assert!(validate_password("Pa0!").is_err());
        assert!(validate_password("Passw0rd! x").is_err());
    }

    #[test]
    fn test_target_from_wire() {
        assert_eq!(
            MessageTarget::from_wire(Some("u2".into()), None),
            Some(MessageTarget::Direct { recipient_id: "u2".into() })
        );
        assert_eq!(
            MessageTarget::from_wire(None, Some("g1".into())).unwrap().group_id(),
            Some("g1")
        );
        assert_eq!(MessageTarget::from_wire(None, None), None);
        assert_eq!(MessageTarget::from_wire(Some("u".into()), Some("g".into())), None);
    }

    #[test]
    fn test_message_serializes_flat() {
        let msg = Message::new(
            "u1",
            MessageTarget::Direct { recipient_id: "u2".into() },
            "hi",
            MessageKind::Text,
            "c2VhbGVk",
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["recipient_id"], "u2");
        assert_eq!(json["type"], "text");
        assert!(json.get("group_id").is_none());
        assert_eq!(serde_json::from_value::<Message>(json).unwrap(), msg);
    }

    #[test]
    fn test_group_members() {
        let mut group = Group::new(
            "g1",
            "friends",
            vec!["b".into(), "a".into(), "b".into(), " ".into()],
            "a",
            Some(1),
        )
        .unwrap();
        assert_eq!(group.members, vec!["b", "a"]);
        assert!(!group.add_member("a"));
        assert!(group.add_member("c"));
        assert_eq!(group.members, vec!["b", "a", "c"]);

        assert!(Group::new("g2", "empty", vec![], "a", None).is_err());
    }

    #[test]
    fn test_kind_from_wire() {
        assert_eq!(MessageKind::from_wire("voice"), MessageKind::Voice);
        assert_eq!(MessageKind::from_wire("sticker"), MessageKind::Text);
        assert_eq!(MessageKind::File.as_str(), "file");
    }
}
