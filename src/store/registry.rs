//! Windows 레지스트리 저장소
//!
//! namespace → 서브키 경로 (예: `SOFTWARE\MSPByte\MSPAgent`), key → 값 이름.
//! 서브키나 값이 없으면 `Ok(None)` 입니다. 값은 `REG_SZ` 문자열로 저장합니다.

use async_trait::async_trait;
use tracing::debug;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
use winreg::RegKey;

use super::{map_io_error, run_blocking, validate_key, KeyValueStore, StoreError};

#[derive(Debug, Clone, Copy)]
pub struct RegistryStore {
    root: winreg::HKEY,
}

impl RegistryStore {
    /// `HKEY_LOCAL_MACHINE` (에이전트 기본 위치)
    pub fn local_machine() -> Self {
        Self { root: HKEY_LOCAL_MACHINE }
    }

    /// `HKEY_CURRENT_USER`
    pub fn current_user() -> Self {
        Self { root: HKEY_CURRENT_USER }
    }
}

fn read_value(root: winreg::HKEY, path: &str, name: &str) -> Result<Option<String>, StoreError> {
    let hive = RegKey::predef(root);
    let subkey = match hive.open_subkey(path) {
        Ok(key) => key,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(map_io_error(e)),
    };
    match subkey.get_value::<String, _>(name) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(map_io_error(e)),
    }
}

fn write_value(root: winreg::HKEY, path: &str, name: &str, value: &str) -> Result<(), StoreError> {
    let hive = RegKey::predef(root);
    let (subkey, _) = hive.create_subkey(path).map_err(map_io_error)?;
    subkey.set_value(name, &value).map_err(map_io_error)
}

#[async_trait]
impl KeyValueStore for RegistryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(namespace, key)?;
        debug!(namespace = %namespace, key = %key, "Reading registry value");
        let (root, ns, k) = (self.root, namespace.to_string(), key.to_string());
        run_blocking(move || read_value(root, &ns, &k)).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(namespace, key)?;
        debug!(namespace = %namespace, key = %key, "Writing registry value");
        let (root, ns, k, v) = (self.root, namespace.to_string(), key.to_string(), value.to_string());
        run_blocking(move || write_value(root, &ns, &k, &v)).await
    }
}
