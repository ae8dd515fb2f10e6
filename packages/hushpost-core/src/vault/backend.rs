//! Secret storage backends.
//!
//! ```text
//! ┌───────────────────────────┐   ┌───────────────────────────┐
//! │   iOS / macOS             │   │   Everything else         │
//! │   KeychainBackend         │   │   MemoryBackend           │
//! │                           │   │                           │
//! │ - generic password items  │   │ - process-local map       │
//! │ - scoped to service name  │   │ - tests and desktop dev   │
//! │ - app-private, per device │   │ - values zeroized on drop │
//! └───────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! Android keeps secrets in the host's Keystore; the host registers its own
//! [`SecretBackend`] through the FFI layer.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::error::Result;

/// Raw key/value storage for secrets
///
/// `put` replaces any existing value under `key`; implementations perform
/// the delete-then-add themselves so no two values ever coexist.
pub trait SecretBackend: Send + Sync {
    /// Upsert `value` under `key`
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the value under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Remove `key`; `false` when nothing was stored
    fn remove(&self, key: &str) -> Result<bool>;

    /// Whether anything is stored under `key`
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Process-local backend
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryBackend {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SecretBackend for MemoryBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        entries.remove(key);
        entries.insert(key.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }
}

// ============================================================================
// KEYCHAIN
// ============================================================================

/// Keychain-backed store for Apple platforms
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub struct KeychainBackend {
    service: String,
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
impl KeychainBackend {
    /// Items are grouped under `service`
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn is_not_found(e: &security_framework::base::Error) -> bool {
        const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;
        e.code() == ERR_SEC_ITEM_NOT_FOUND
    }
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
impl SecretBackend for KeychainBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        use security_framework::passwords::{delete_generic_password, set_generic_password};

        match delete_generic_password(&self.service, key) {
            Ok(()) => {}
            Err(e) if Self::is_not_found(&e) => {}
            Err(e) => {
                return Err(crate::Error::VaultError(format!(
                    "Keychain delete failed: {}",
                    e
                )))
            }
        }

        set_generic_password(&self.service, key, value)
            .map_err(|e| crate::Error::VaultError(format!("Keychain write failed: {}", e)))
    }

    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        use security_framework::passwords::get_generic_password;

        match get_generic_password(&self.service, key) {
            Ok(data) => Ok(Some(Zeroizing::new(data))),
            Err(e) if Self::is_not_found(&e) => Ok(None),
            Err(e) => Err(crate::Error::VaultError(format!(
                "Keychain read failed: {}",
                e
            ))),
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        use security_framework::passwords::delete_generic_password;

        match delete_generic_password(&self.service, key) {
            Ok(()) => Ok(true),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(crate::Error::VaultError(format!(
                "Keychain delete failed: {}",
                e
            ))),
        }
    }
}

/// The platform's default backend
pub fn platform_backend(service: &str) -> Box<dyn SecretBackend> {
    #[cfg(any(target_os = "ios", target_os = "macos"))]
    {
        Box::new(KeychainBackend::new(service))
    }
    #[cfg(not(any(target_os = "ios", target_os = "macos")))]
    {
        tracing::debug!("No OS keystore for {}; using in-memory secrets", service);
        Box::new(MemoryBackend::new())
    }
}
