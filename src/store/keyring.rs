//! OS 키체인/키링 저장소
//!
//! namespace → keyring service, key → keyring account 로 매핑합니다.
//! keyring 호출은 블로킹이므로 `spawn_blocking`에서 실행합니다.

use async_trait::async_trait;
use keyring::{Entry, Error as KeyringError};
use tracing::debug;

use super::{run_blocking, validate_key, KeyValueStore, StoreError};

#[derive(Debug, Default, Clone)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }
}

fn map_keyring_error(err: KeyringError) -> StoreError {
    match err {
        KeyringError::NoStorageAccess(e) => StoreError::PermissionDenied(e.to_string()),
        KeyringError::BadEncoding(_) => {
            StoreError::Corrupted("stored value is not valid UTF-8".to_string())
        }
        KeyringError::Ambiguous(_) => {
            StoreError::Corrupted("multiple credentials match this key".to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn read_entry(namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
    let entry = Entry::new(namespace, key).map_err(map_keyring_error)?;
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(err) => Err(map_keyring_error(err)),
    }
}

fn write_entry(namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
    let entry = Entry::new(namespace, key).map_err(map_keyring_error)?;
    entry.set_password(value).map_err(map_keyring_error)
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(namespace, key)?;
        debug!(namespace = %namespace, key = %key, "Reading keyring entry");
        let (ns, k) = (namespace.to_string(), key.to_string());
        run_blocking(move || read_entry(&ns, &k)).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(namespace, key)?;
        debug!(namespace = %namespace, key = %key, "Writing keyring entry");
        let (ns, k, v) = (namespace.to_string(), key.to_string(), value.to_string());
        run_blocking(move || write_entry(&ns, &k, &v)).await
    }
}
