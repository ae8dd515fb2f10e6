//! # Credential Vault
//!
//! Custody of long-lived secrets, user-presence gating, and device
//! integrity attestation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CREDENTIAL VAULT                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  store / retrieve / delete / exists                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─────────────────────┐    optional wrapping key                      │
//! │  │  AES-256-GCM wrap   │◄── (AAD = storage key name)                   │
//! │  └─────────┬───────────┘                                                │
//! │            ▼                                                            │
//! │  ┌─────────────────────┐                                                │
//! │  │  SecretBackend      │  Keychain (Apple) │ memory │ host-provided    │
//! │  └─────────────────────┘                                                │
//! │                                                                         │
//! │  generate_key_pair(tag)   RSA pair, prior pair under tag removed first │
//! │  encrypt_and_store(key)   fresh SymmetricKey + ciphertext, both stored │
//! │  authenticate(reason)     PresenceAuthenticator, off the caller thread │
//! │  attest_integrity()       IntegrityProbe, four checks                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `store`, `retrieve` and `delete` report failure as `false` / `None`;
//! absence is a normal outcome, never an error. The `try_*` variants keep the
//! underlying error for callers that need it.

mod auth;
mod backend;
mod hash;
mod integrity;
mod wipe;

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::{decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, RsaKeyPair, SymmetricKey};
use crate::error::{Error, Result};

pub use auth::{authenticate, AuthMode, ChallengeOutcome, PresenceAuthenticator, UnsupportedAuthenticator};
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub use backend::KeychainBackend;
pub use backend::{platform_backend, MemoryBackend, SecretBackend};
pub use hash::{secure_hash, verify_hash, SECURE_HASH_SALT_SIZE};
pub use integrity::{
    attest, platform_compromised_markers, IntegrityCheck, IntegrityProbe, IntegrityReport,
    IntegrityVerdict, SystemProbe, ANDROID_ROOT_PATHS, IOS_JAILBREAK_PATHS,
};
pub use wipe::{secure_wipe, WIPE_PASSES};

/// Suffix under which a tag's private key is stored
const PRIVATE_SUFFIX: &str = ".private";

/// Suffix under which a tag's public key is stored
const PUBLIC_SUFFIX: &str = ".public";

/// Suffix under which `encrypt_and_store` keeps the per-item key
const ITEM_KEY_SUFFIX: &str = ".key";

/// OS-backed secret custody
pub struct CredentialVault {
    backend: Arc<dyn SecretBackend>,
    wrapping_key: Option<SymmetricKey>,
    authenticator: Arc<dyn PresenceAuthenticator>,
    probe: Arc<dyn IntegrityProbe>,
}

impl CredentialVault {
    /// Vault over `backend` with no presence authenticator and the system
    /// integrity probe
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            backend,
            wrapping_key: None,
            authenticator: Arc::new(UnsupportedAuthenticator),
            probe: Arc::new(SystemProbe::new()),
        }
    }

    /// Vault over a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Vault over the platform's default backend
    pub fn platform(service: &str) -> Self {
        Self::new(Arc::from(platform_backend(service)))
    }

    /// Additionally seal every value with `key` before it reaches the backend
    pub fn with_wrapping_key(mut self, key: SymmetricKey) -> Self {
        self.wrapping_key = Some(key);
        self
    }

    /// Use `authenticator` for presence challenges
    pub fn with_authenticator(mut self, authenticator: Arc<dyn PresenceAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Use `probe` for integrity attestation
    pub fn with_integrity_probe(mut self, probe: Arc<dyn IntegrityProbe>) -> Self {
        self.probe = probe;
        self
    }

    // ========================================================================
    // STORAGE
    // ========================================================================

    /// Upsert `data` under `key`.
    pub fn try_store(&self, key: &str, data: &[u8]) -> Result<()> {
        match self.wrapping_key {
            Some(ref wrap) => {
                let sealed = encrypt_with_aad(data, wrap, key.as_bytes())?;
                self.backend.put(key, &sealed)
            }
            None => self.backend.put(key, data),
        }
    }

    /// Fetch the value under `key`.
    pub fn try_retrieve(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let raw = match self.backend.get(key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match self.wrapping_key {
            Some(ref wrap) => {
                let plain = decrypt_with_aad(&raw, wrap, key.as_bytes())
                    .map_err(|_| Error::VaultError(format!("stored value for {} is corrupted", key)))?;
                Ok(Some(Zeroizing::new(plain)))
            }
            None => Ok(Some(raw)),
        }
    }

    /// Upsert; `false` if the backend refused.
    pub fn store(&self, key: &str, data: &[u8]) -> bool {
        match self.try_store(key, data) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Vault store failed for {}: {}", key, e);
                false
            }
        }
    }

    /// Fetch; `None` when absent or unreadable.
    pub fn retrieve(&self, key: &str) -> Option<Zeroizing<Vec<u8>>> {
        match self.try_retrieve(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Vault retrieve failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Remove; `true` only when something was deleted.
    pub fn delete(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!("Vault delete failed for {}: {}", key, e);
                false
            }
        }
    }

    /// Whether anything is stored under `key`
    pub fn exists(&self, key: &str) -> bool {
        self.backend.contains(key).unwrap_or(false)
    }

    // ========================================================================
    // ENCRYPT-AND-STORE
    // ========================================================================

    /// Seal `data` under a fresh key; the ciphertext goes under `key` and the
    /// per-item key under `<key>.key`.
    pub fn encrypt_and_store(&self, key: &str, data: &[u8]) -> Result<()> {
        let item_key = SymmetricKey::generate()?;
        let sealed = encrypt(data, &item_key)?;

        self.try_store(&item_key_name(key), item_key.as_bytes())?;
        self.try_store(key, &sealed)
    }

    /// Reverse of [`encrypt_and_store`](Self::encrypt_and_store).
    pub fn retrieve_and_decrypt(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let sealed = match self.try_retrieve(key)? {
            Some(s) => s,
            None => return Ok(None),
        };
        let raw_key = self
            .try_retrieve(&item_key_name(key))?
            .ok_or_else(|| Error::SecretNotFound(item_key_name(key)))?;
        let item_key = SymmetricKey::from_slice(&raw_key)?;

        Ok(Some(Zeroizing::new(decrypt(&sealed, &item_key)?)))
    }

    /// Delete an item written by `encrypt_and_store` together with its key
    pub fn delete_encrypted(&self, key: &str) -> bool {
        let removed_key = self.delete(&item_key_name(key));
        self.delete(key) || removed_key
    }

    // ========================================================================
    // KEY PAIRS
    // ========================================================================

    /// Generate an RSA-2048 pair under `tag`, replacing any prior pair.
    pub fn generate_key_pair(&self, tag: &str) -> Result<RsaKeyPair> {
        if self.delete_key_pair(tag) {
            tracing::info!("Replaced existing key pair under {}", tag);
        }

        let pair = RsaKeyPair::generate()?;
        self.try_store(&format!("{}{}", tag, PRIVATE_SUFFIX), &pair.private_key_der()?)?;
        self.try_store(&format!("{}{}", tag, PUBLIC_SUFFIX), &pair.public_key_der()?)?;
        Ok(pair)
    }

    /// Load the pair stored under `tag`
    pub fn load_key_pair(&self, tag: &str) -> Result<Option<RsaKeyPair>> {
        match self.try_retrieve(&format!("{}{}", tag, PRIVATE_SUFFIX))? {
            Some(der) => Ok(Some(RsaKeyPair::from_private_key_der(&der)?)),
            None => Ok(None),
        }
    }

    /// Remove the pair under `tag`; `true` if anything was removed
    pub fn delete_key_pair(&self, tag: &str) -> bool {
        let private = self.delete(&format!("{}{}", tag, PRIVATE_SUFFIX));
        let public = self.delete(&format!("{}{}", tag, PUBLIC_SUFFIX));
        private || public
    }

    // ========================================================================
    // PRESENCE & INTEGRITY
    // ========================================================================

    /// Require user presence before a sensitive operation
    pub async fn authenticate(&self, reason: &str, mode: AuthMode) -> Result<()> {
        authenticate(self.authenticator.clone(), reason, mode).await
    }

    /// Run the four integrity checks
    pub fn attest_integrity(&self) -> IntegrityVerdict {
        attest(self.probe.as_ref())
    }

    /// Run the checks and fold in observations made by the host
    pub fn attest_integrity_with(&self, host: IntegrityReport) -> IntegrityVerdict {
        let verdict = self.probe.report().merge(host).verdict();
        if let IntegrityVerdict::Tampered { reasons } = &verdict {
            tracing::warn!("Integrity checks tripped: {:?}", reasons);
        }
        verdict
    }
}

fn item_key_name(key: &str) -> String {
    format!("{}{}", key, ITEM_KEY_SUFFIX)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retrieve_delete() {
        let vault = CredentialVault::in_memory();

        assert!(vault.store("token", b"abc"));
        assert_eq!(&**vault.retrieve("token").unwrap(), b"abc");
        assert!(vault.exists("token"));

        assert!(vault.delete("token"));
        assert!(vault.retrieve("token").is_none());
        assert!(!vault.exists("token"));
        assert!(!vault.delete("token"));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let vault = CredentialVault::in_memory();
        assert!(vault.store("k", b"old"));
        assert!(vault.store("k", b"new"));
        assert_eq!(&**vault.retrieve("k").unwrap(), b"new");

        assert!(vault.delete("k"));
        assert!(vault.retrieve("k").is_none());
    }

    #[test]
    fn test_missing_is_none_not_error() {
        let vault = CredentialVault::in_memory();
        assert!(vault.retrieve("nope").is_none());
        assert!(vault.try_retrieve("nope").unwrap().is_none());
    }

    #[test]
    fn test_wrapped_values_bound_to_key_name() {
        let backend = Arc::new(MemoryBackend::new());
        let vault = CredentialVault::new(backend.clone())
            .with_wrapping_key(SymmetricKey::from_bytes([3u8; 32]));

        assert!(vault.store("a", b"secret"));
        let raw = backend.get("a").unwrap().unwrap();
        assert_ne!(&**raw, b"secret");
        assert_eq!(&**vault.retrieve("a").unwrap(), b"secret");

        // Ciphertext moved to another name no longer opens
        backend.put("b", &raw).unwrap();
        assert!(vault.retrieve("b").is_none());
        assert!(matches!(vault.try_retrieve("b"), Err(Error::VaultError(_))));
    }

    #[test]
    fn test_encrypt_and_store() {
        let backend = Arc::new(MemoryBackend::new());
        let vault = CredentialVault::new(backend.clone());

        vault.encrypt_and_store("note", b"meet at noon").unwrap();
        assert!(backend.contains("note.key").unwrap());
        assert_ne!(&**backend.get("note").unwrap().unwrap(), b"meet at noon");

        let plain = vault.retrieve_and_decrypt("note").unwrap().unwrap();
        assert_eq!(&**plain, b"meet at noon");

        assert!(vault.delete_encrypted("note"));
        assert!(vault.retrieve_and_decrypt("note").unwrap().is_none());
        assert!(!backend.contains("note.key").unwrap());
    }

    #[test]
    fn test_encrypt_and_store_missing_key_fails() {
        let backend = Arc::new(MemoryBackend::new());
        let vault = CredentialVault::new(backend.clone());

        vault.encrypt_and_store("note", b"x").unwrap();
        backend.remove("note.key").unwrap();
        assert!(matches!(
            vault.retrieve_and_decrypt("note"),
            Err(Error::SecretNotFound(_))
        ));
    }

    #[test]
    fn test_key_pair_replaces_prior() {
        let backend = Arc::new(MemoryBackend::new());
        let vault = CredentialVault::new(backend.clone());

        let first = vault.generate_key_pair("com.hushpost.test").unwrap();
        let second = vault.generate_key_pair("com.hushpost.test").unwrap();
        assert_ne!(first.public_key(), second.public_key());
        assert_eq!(backend.len(), 2);

        let loaded = vault.load_key_pair("com.hushpost.test").unwrap().unwrap();
        assert_eq!(loaded.public_key(), second.public_key());

        assert!(vault.delete_key_pair("com.hushpost.test"));
        assert!(vault.load_key_pair("com.hushpost.test").unwrap().is_none());
    }

    #[test]
    fn test_attest_with_host_debugger() {
        let dir = tempfile::tempdir().unwrap();
        let probe = SystemProbe::with_root(dir.path(), ANDROID_ROOT_PATHS);
        let vault = CredentialVault::in_memory().with_integrity_probe(Arc::new(probe));

        assert_eq!(vault.attest_integrity(), IntegrityVerdict::Trusted);

        let host = IntegrityReport {
            debugger: true,
            ..Default::default()
        };
        assert!(vault.attest_integrity_with(host).is_tampered());
    }

    #[tokio::test]
    async fn test_authenticate_without_authenticator() {
        let vault = CredentialVault::in_memory();
        assert!(matches!(
            vault.authenticate("unlock", AuthMode::Biometric).await,
            Err(Error::AuthUnavailable(_))
        ));
    }
}
