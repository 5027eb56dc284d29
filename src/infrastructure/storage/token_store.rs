use crate::application::ports::auth_store::AuthTokenStore;
use crate::domain::entities::StoredAuth;
use crate::shared::error::AppError;
use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

const SERVICE_NAME: &str = "pocket-starter";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("keyring entry unavailable: {0}")]
    Entry(#[source] keyring::Error),
    #[error("keyring operation failed: {0}")]
    Keyring(#[source] keyring::Error),
    #[error("stored auth is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// OS のキーリングに認証情報を保存する（バックエンドごとに別エントリ）
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            account: format!("auth:{}", base_url.trim_end_matches('/')),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Entry::new(SERVICE_NAME, &self.account).map_err(StorageError::Entry)
    }
}

#[async_trait]
impl AuthTokenStore for KeyringTokenStore {
    async fn save(&self, auth: &StoredAuth) -> Result<(), AppError> {
        let json = serde_json::to_string(auth)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        match self.entry()?.set_password(&json) {
            Ok(()) => {
                debug!(account = %self.account, "auth saved to keyring");
                Ok(())
            }
            Err(e) => {
                error!(account = %self.account, error = ?e, "failed to save auth to keyring");
                Err(StorageError::Keyring(e).into())
            }
        }
    }

    async fn load(&self) -> Result<Option<StoredAuth>, AppError> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let auth = serde_json::from_str(&json).map_err(StorageError::from)?;
                Ok(Some(auth))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                error!(account = %self.account, error = ?e, "failed to read auth from keyring");
                Err(StorageError::Keyring(e).into())
            }
        }
    }

    async fn clear(&self) -> Result<(), AppError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                error!(account = %self.account, error = ?e, "failed to clear auth from keyring");
                Err(StorageError::Keyring(e).into())
            }
        }
    }
}

/// プロセス内だけで保持するストア
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Option<StoredAuth>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthTokenStore for MemoryTokenStore {
    async fn save(&self, auth: &StoredAuth) -> Result<(), AppError> {
        *self.inner.write().await = Some(auth.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<StoredAuth>, AppError> {
        Ok(self.inner.read().await.clone())
    }

    async fn clear(&self) -> Result<(), AppError> {
        *self.inner.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Fields, Record};
    use crate::domain::value_objects::{AuthToken, RecordId};

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());

        let auth = StoredAuth {
            token: AuthToken::new("a.b.c").unwrap(),
            record: Record::new(RecordId::new("u1").unwrap(), Fields::new()),
        };
        store.save(&auth).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.record.id.as_str(), "u1");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn corrupted_payload_maps_to_storage_error() {
        let err = serde_json::from_str::<StoredAuth>("not json")
            .map_err(StorageError::from)
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Storage(_)));
    }

    #[test]
    fn keyring_account_is_scoped_by_backend() {
        let store = KeyringTokenStore::new("http://127.0.0.1:8090/");
        assert_eq!(store.account, "auth:http://127.0.0.1:8090");
    }
}
