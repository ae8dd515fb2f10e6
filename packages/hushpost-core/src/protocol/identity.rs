//! # Identity
//!
//! Account operations and the current-user session.
//!
//! ```text
//!  register(username, email, password)
//!    │ validate inputs              ── InvalidInput, nothing else happens
//!    │ RSA-2048 pair → vault        ── replaces any prior pair under the tag
//!    │ PBKDF2(password, fresh salt)
//!    │ seal + POST /api/register
//!    ▼
//!  reply.user merged over what was sent → Session
//! ```
//!
//! The session is the only place the current user lives. Only this service
//! writes it; everything else reads a clone.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use serde::Serialize;

use super::client::ProtocolClient;
use super::models::{validate_email, validate_password, validate_username, User};
use super::reply::UserRecord;
use crate::crypto::hash_password;
use crate::error::{Error, Result};
use crate::logging::Redacted;
use crate::time::{now_timestamp, now_timestamp_millis};
use crate::vault::CredentialVault;

/// Vault key of the persisted session
pub const SESSION_KEY: &str = "session.current_user";

// ============================================================================
// SESSION
// ============================================================================

/// Holder of the current user; clones share state
#[derive(Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<User>>>,
}

impl Session {
    /// Empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current user, if any
    pub fn current(&self) -> Option<User> {
        self.current.read().clone()
    }

    /// Whether a user is signed in
    pub fn is_logged_in(&self) -> bool {
        self.current.read().is_some()
    }

    pub(crate) fn set(&self, user: User) {
        *self.current.write() = Some(user);
    }

    pub(crate) fn clear(&self) -> Option<User> {
        self.current.write().take()
    }

    /// Write the current user to the vault; `false` if nobody is signed in
    pub fn persist(&self, vault: &CredentialVault) -> Result<bool> {
        let Some(user) = self.current() else {
            return Ok(false);
        };
        vault.try_store(SESSION_KEY, &serde_json::to_vec(&user)?)?;
        Ok(true)
    }

    /// Load a persisted user into the session
    pub fn restore(&self, vault: &CredentialVault) -> Result<Option<User>> {
        let Some(raw) = vault.try_retrieve(SESSION_KEY)? else {
            return Ok(None);
        };
        let user: User = serde_json::from_slice(&raw)
            .map_err(|e| Error::DeserializationError(format!("session: {}", e)))?;
        self.set(user.clone());
        Ok(Some(user))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}

// ============================================================================
// REQUEST RECORDS
// ============================================================================

#[derive(Serialize)]
struct RegisterRecord<'a> {
    username: &'a str,
    email: &'a str,
    password_hash: String,
    salt: String,
    public_key: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
struct LoginRecord<'a> {
    email: &'a str,
    password_hash: String,
    salt: String,
    timestamp: i64,
}

#[derive(Serialize)]
struct UpdateProfileRecord<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<&'a str>,
    timestamp: i64,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Register, login, profile and logout
pub struct IdentityService {
    client: Arc<ProtocolClient>,
    vault: Arc<CredentialVault>,
    session: Session,
    key_pair_tag: String,
}

impl IdentityService {
    /// Service writing to `session` and keeping keys under `key_pair_tag`
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

    /// The session this service writes
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current user, if any
    pub fn current_user(&self) -> Option<User> {
        self.session.current()
    }

    /// Whether a user is signed in
    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Create an account and sign in as it
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        let vault = self.vault.clone();
        let tag = self.key_pair_tag.clone();
        let pair = tokio::task::spawn_blocking(move || vault.generate_key_pair(&tag))
            .await
            .map_err(|e| Error::Internal(format!("key generation task: {}", e)))??;
        let public_key = pair.public_key_base64()?;

        let hashed = hash_password(password, None)?;
        let record = RegisterRecord {
            username,
            email,
            password_hash: BASE64.encode(&hashed.hash),
            salt: BASE64.encode(&hashed.salt),
            public_key: &public_key,
            timestamp: now_timestamp_millis(),
        };

        let reply = self
            .client
            .call(&self.client.endpoints().register, &record, "Registration failed")
            .await?;

        let sent = User {
            id: String::new(),
            username: username.to_string(),
            email: email.to_string(),
            public_key,
            avatar: None,
            created_at: now_timestamp(),
        };
        let user = reply.payload::<UserRecord>("user")?.merge(sent)?;

        tracing::info!(user = %Redacted(&user.username), "Registered");
        self.session.set(user.clone());
        Ok(user)
    }

    /// Sign in to an existing account
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(Error::InvalidInput("password is required".into()));
        }

        let hashed = hash_password(password, None)?;
        let record = LoginRecord {
            email,
            password_hash: BASE64.encode(&hashed.hash),
            salt: BASE64.encode(&hashed.salt),
            timestamp: now_timestamp_millis(),
        };

        let reply = self
            .client
            .call(&self.client.endpoints().login, &record, "Login failed")
            .await?;

        let known_key = match self.vault.load_key_pair(&self.key_pair_tag) {
            Ok(Some(pair)) => pair.public_key_base64().unwrap_or_default(),
            _ => String::new(),
        };
        let sent = User {
            id: String::new(),
            username: String::new(),
            email: email.to_string(),
            public_key: known_key,
            avatar: None,
            created_at: now_timestamp(),
        };
        let user = reply.payload::<UserRecord>("user")?.merge(sent)?;

        tracing::info!(user = %Redacted(&user.username), "Logged in");
        self.session.set(user.clone());
        Ok(user)
    }

    /// Change the avatar of the signed-in user
    pub async fn update_profile(&self, avatar: Option<&str>) -> Result<User> {
        let current = self.session.current().ok_or(Error::NotLoggedIn)?;

        let record = UpdateProfileRecord {
            user_id: &current.id,
            avatar,
            timestamp: now_timestamp_millis(),
        };
        let reply = self
            .client
            .call(
                &self.client.endpoints().update_profile,
                &record,
                "Update profile failed",
            )
            .await?;

        let mut sent = current.clone();
        if let Some(avatar) = avatar {
            sent.avatar = Some(avatar.to_string());
        }
        let user = reply.payload::<UserRecord>("user")?.merge(sent)?;

        self.session.set(user.clone());
        Ok(user)
    }

    /// Sign out and forget any persisted session; `false` if nobody was signed in
    pub fn logout(&self) -> bool {
        let was = self.session.clear().is_some();
        self.vault.delete(SESSION_KEY);
        if was {
            tracing::info!("Logged out");
        }
        was
    }

    /// Persist the session to the vault
    pub fn persist_session(&self) -> Result<bool> {
        self.session.persist(&self.vault)
    }

    /// Restore a persisted session
    pub fn restore_session(&self) -> Result<Option<User>> {
        self.session.restore(&self.vault)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::crypto::fixtures::SERVER;
    use crate::protocol::envelope::open_request;
    use crate::transport::fakes::{fast_config, ControlMode, FakeConnector, FakeLauncher, RecordingHttp};
    use crate::transport::{AnonymizingTransport, HttpRequest};

    /// Server stand-in: opens the envelope, hands the record to `answer`,
    /// seals whatever JSON it returns
    pub(crate) fn fake_server(
        answer: impl Fn(&str, serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    ) -> Arc<RecordingHttp> {
        RecordingHttp::new(move |request: &HttpRequest| {
            let path = reqwest::Url::parse(&request.url).unwrap().path().to_string();
            let body = request.body.as_deref().unwrap_or_default();
            let (record, sealer) = open_request(body, SERVER.private_key(), path.as_bytes())?;
            let record: serde_json::Value = serde_json::from_slice(&record).unwrap();
            let reply = answer(&path, record);
            sealer.seal(&serde_json::to_vec(&reply).unwrap())
        })
    }

    pub(crate) async fn connected_client(http: Arc<RecordingHttp>) -> Arc<ProtocolClient> {
        let transport = AnonymizingTransport::with_components(
            fast_config(),
            FakeLauncher::new(),
            FakeConnector::new(ControlMode::ReadyAfter(1)),
            http,
        );
        transport.start().await.unwrap();
        let config = ProtocolConfig {
            server_public_key: Some(SERVER.public_key_base64().unwrap()),
            ..Default::default()
        };
        Arc::new(ProtocolClient::new(transport, config).unwrap())
    }

    fn accounts() -> Arc<RecordingHttp> {
        fake_server(|path, record| match path {
            "/api/register" => serde_json::json!({
                "success": true,
                "user": { "id": "srv-1", "username": record["username"] },
            }),
            "/api/login" if record["email"] == "alice@example.com" => serde_json::json!({
                "success": true,
                "user": { "id": "srv-1", "username": "alice" },
            }),
            "/api/login" => serde_json::json!({ "success": false, "message": "Unknown account" }),
            "/api/update_profile" => serde_json::json!({
                "success": true,
                "user": { "id": record["user_id"], "avatar": record["avatar"] },
            }),
            _ => serde_json::json!({ "success": false }),
        })
    }

    async fn service(http: Arc<RecordingHttp>) -> (IdentityService, Arc<CredentialVault>) {
        let vault = Arc::new(CredentialVault::in_memory());
        let service = IdentityService::new(
            connected_client(http).await,
            vault.clone(),
            Session::new(),
            "test.rsa",
        );
        (service, vault)
    }

    #[tokio::test]
    async fn test_register_sets_current_user() {
        let http = accounts();
        let (service, vault) = service(http.clone()).await;

        let user = service
            .register("alice", "alice@example.com", "Passw0rd!")
            .await
            .unwrap();

        assert_eq!(user.id, "srv-1");
        assert_eq!(service.current_user().unwrap().username, "alice");
        assert_eq!(service.current_user().unwrap().email, "alice@example.com");
        assert!(vault.load_key_pair("test.rsa").unwrap().is_some());

        let sent = http.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://anonymousmsg.onion/api/register");
    }

    #[tokio::test]
    async fn test_register_record_fields() {
        let http = fake_server(|_, record| {
            let fields: Vec<&str> = record.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(
                fields,
                vec!["email", "password_hash", "public_key", "salt", "timestamp", "username"]
            );
            assert_eq!(
                BASE64.decode(record["salt"].as_str().unwrap()).unwrap().len(),
                crate::crypto::SALT_SIZE
            );
            serde_json::json!({ "success": true, "user": { "id": "srv-2" } })
        });
        let (service, _) = service(http).await;
        service
            .register("@bob_1", "bob@example.com", "Sup3r#pass")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_validates_first() {
        let http = accounts();
        let (service, vault) = service(http.clone()).await;

        let err = service
            .register("alice", "alice@example.com", "weak")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(http.requests().is_empty());
        assert!(vault.load_key_pair("test.rsa").unwrap().is_none());
        assert!(!service.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_and_rejection() {
        let (service, _) = service(accounts()).await;

        let err = service.login("eve@example.com", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown account");
        assert!(!service.is_logged_in());

        let user = service.login("alice@example.com", "Passw0rd!").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert!(service.is_logged_in());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (service, _) = service(accounts()).await;
        assert!(matches!(
            service.update_profile(Some("YXZhdGFy")).await,
            Err(Error::NotLoggedIn)
        ));

        service.login("alice@example.com", "Passw0rd!").await.unwrap();
        let user = service.update_profile(Some("YXZhdGFy")).await.unwrap();
        assert_eq!(user.avatar.as_deref(), Some("YXZhdGFy"));
        assert_eq!(user.username, "alice");
        assert_eq!(service.current_user().unwrap().avatar.as_deref(), Some("YXZhdGFy"));
    }

    #[tokio::test]
    async fn test_logout_and_persistence() {
        let (service, vault) = service(accounts()).await;
        assert!(!service.persist_session().unwrap());

        service.login("alice@example.com", "Passw0rd!").await.unwrap();
        assert!(service.persist_session().unwrap());

        let other = Session::new();
        assert_eq!(other.restore(&vault).unwrap().unwrap().id, "srv-1");
        assert!(other.is_logged_in());

        assert!(service.logout());
        assert!(!service.logout());
        assert!(service.current_user().is_none());
        assert!(Session::new().restore(&vault).unwrap().is_none());
    }
}
