//! 메모리 기반 저장소
//!
//! 테스트에서 백엔드 장애를 재현할 수 있도록 fault injection 스위치를 제공합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, KeyValueStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, String), String>>,
    fail_reads: AtomicBool,
    /// 이 키에 대한 쓰기만 실패시킴
    fail_writes_for: RwLock<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 값이 채워진 저장소
    pub fn with_entries<'a>(
        namespace: &str,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| ((namespace.to_string(), k.to_string()), v.to_string()))
            .collect();
        Self {
            entries: RwLock::new(map),
            ..Self::default()
        }
    }

    /// 모든 읽기를 `Unavailable`로 실패시킴
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 특정 키 쓰기를 `PermissionDenied`로 실패시킴
    pub async fn set_fail_writes_for(&self, key: Option<&str>) {
        *self.fail_writes_for.write().await = key.map(str::to_string);
    }

    /// 성공한 쓰기 횟수
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// fault injection 없이 값을 직접 조회
    pub async fn peek(&self, namespace: &str, key: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(namespace, key)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store reads disabled".to_string()));
        }
        Ok(self.peek(namespace, key).await)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(namespace, key)?;
        if self.fail_writes_for.read().await.as_deref() == Some(key) {
            return Err(StoreError::PermissionDenied(format!("write to {} blocked", key)));
        }
        self.entries
            .write()
            .await
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "SOFTWARE\\Test\\Agent";

    #[tokio::test]
    async fn test_set_then_get_returns_same_value() {
        let store = MemoryStore::new();
        store.set(NS, "APIKey", "key-abc").await.unwrap();
        assert_eq!(store.get(NS, "APIKey").await.unwrap(), Some("key-abc".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get(NS, "DeviceID").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryStore::with_entries(NS, [("APIKey", "a")]);
        assert_eq!(store.get("Other", "APIKey").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        assert!(matches!(
            store.get(NS, "APIKey").await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_fail_writes_for(Some("DeviceID")).await;
        assert!(store.set(NS, "APIKey", "k").await.is_ok());
        assert!(matches!(
            store.set(NS, "DeviceID", "d").await,
            Err(StoreError::PermissionDenied(_))
        ));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        assert_eq!(store.set(NS, " ", "v").await, Err(StoreError::InvalidKey));
    }
}
