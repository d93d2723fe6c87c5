use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::RwLock;

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "liftskit";

/// The named slots a session keeps in secure storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    AccessToken,
    RefreshToken,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 2] = [CredentialSlot::AccessToken, CredentialSlot::RefreshToken];

    /// Storage key for the slot
    pub fn key(self) -> &'static str {
        match self {
            CredentialSlot::AccessToken => "ACCESS_TOKEN",
            CredentialSlot::RefreshToken => "REFRESH_TOKEN",
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keychain error for {slot}: {source}")]
    Keyring {
        slot: CredentialSlot,
        #[source]
        source: keyring::Error,
    },

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Secure storage for session credentials.
///
/// The store is shared by every in-flight request without locking across
/// calls; concurrent refreshes race and the last write wins.
pub trait CredentialStore: Send + Sync {
    fn get_item(&self, slot: CredentialSlot) -> BoxFuture<'_, Result<Option<String>, StoreError>>;

    fn set_item<'a>(
        &'a self,
        slot: CredentialSlot,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn clear_all(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Credentials kept in the OS keychain.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, slot: CredentialSlot) -> Result<Entry, StoreError> {
        Entry::new(&self.service, slot.key()).map_err(|source| StoreError::Keyring { slot, source })
    }

    fn read(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        match self.entry(slot)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(source) => Err(StoreError::Keyring { slot, source }),
        }
    }

    fn write(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        self.entry(slot)?
            .set_password(value)
            .map_err(|source| StoreError::Keyring { slot, source })
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        for slot in CredentialSlot::ALL {
            match self.entry(slot)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(source) => return Err(StoreError::Keyring { slot, source }),
            }
        }
        Ok(())
    }
}

impl CredentialStore for KeyringStore {
    fn get_item(&self, slot: CredentialSlot) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        Box::pin(async move { self.read(slot) })
    }

    fn set_item<'a>(
        &'a self,
        slot: CredentialSlot,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.write(slot, value) })
    }

    fn clear_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.delete_all() })
    }
}

/// In-process credential store, for tests and sessions that should not
/// outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<CredentialSlot, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with both tokens
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let mut slots = HashMap::new();
        slots.insert(CredentialSlot::AccessToken, access_token.to_string());
        slots.insert(CredentialSlot::RefreshToken, refresh_token.to_string());
        Self {
            slots: RwLock::new(slots),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get_item(&self, slot: CredentialSlot) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        Box::pin(async move { Ok(self.slots.read().await.get(&slot).cloned()) })
    }

    fn set_item<'a>(
        &'a self,
        slot: CredentialSlot,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.slots.write().await.insert(slot, value.to_string());
            Ok(())
        })
    }

    fn clear_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.slots.write().await.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys() {
        assert_eq!(CredentialSlot::AccessToken.key(), "ACCESS_TOKEN");
        assert_eq!(CredentialSlot::RefreshToken.to_string(), "REFRESH_TOKEN");
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item(CredentialSlot::AccessToken).await.unwrap(), None);

        store.set_item(CredentialSlot::AccessToken, "a1").await.unwrap();
        store.set_item(CredentialSlot::RefreshToken, "r1").await.unwrap();
        store.set_item(CredentialSlot::AccessToken, "a2").await.unwrap();
        assert_eq!(
            store.get_item(CredentialSlot::AccessToken).await.unwrap().as_deref(),
            Some("a2")
        );

        store.clear_all().await.unwrap();
        for slot in CredentialSlot::ALL {
            assert_eq!(store.get_item(slot).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_memory_store_with_tokens() {
        let store = MemoryStore::with_tokens("access", "refresh");
        assert_eq!(
            store.get_item(CredentialSlot::RefreshToken).await.unwrap().as_deref(),
            Some("refresh")
        );
    }
}
