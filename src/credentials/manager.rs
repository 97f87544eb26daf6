//! Credential Manager - 캐시 확인 → 부트스트랩 → 저장
//!
//! 저장소 쓰기 순서: `APIKey` → `DeviceID` → `EnrollmentSecret = ""`.
//! 새 키가 저장되기 전에는 secret을 절대 지우지 않습니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::device::{DeviceIdentityProvider, HostnameProvider};
use crate::enrollment::{Enroller, HttpEnrollmentClient};
use crate::error::{CredentialError, Stage};
use crate::secret::{ApiKey, Secret};
#[cfg(windows)]
use crate::store::RegistryStore;
#[cfg(not(windows))]
use crate::store::KeyringStore;
use crate::store::{
    KeyValueStore, KEY_API_ENDPOINT, KEY_API_KEY, KEY_DEVICE_ID,
    KEY_ENROLLMENT_SECRET,
};

/// 전역 CredentialManager 인스턴스 (OS 키링 + 호스트 이름 + HTTP)
pub static CREDENTIALS: Lazy<CredentialManager> = Lazy::new(|| {
    let config = AgentConfig::from_env();
    let enroller = HttpEnrollmentClient::new(config.request_timeout).unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to default HTTP client");
        HttpEnrollmentClient::with_client(reqwest::Client::new())
    });
    CredentialManager::new(
        config,
        default_store(),
        Arc::new(HostnameProvider),
        Arc::new(enroller),
    )
});

/// 플랫폼 기본 저장소: Windows는 레지스트리(설치 프로그램이 secret을 기록하는 위치), 그 외는 OS 키링
#[cfg(windows)]
fn default_store() -> Arc<dyn KeyValueStore> {
    Arc::new(RegistryStore::local_machine())
}

#[cfg(not(windows))]
fn default_store() -> Arc<dyn KeyValueStore> {
    Arc::new(KeyringStore::new())
}

/// 자격증명 상태 (진단용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    NoCredential,
    HasCredential,
    Bootstrapping,
    Failed,
}

type BootstrapOutcome = Result<ApiKey, CredentialError>;
type Flight = Shared<BoxFuture<'static, BootstrapOutcome>>;

/// 부트스트랩에 필요한 협력자 묶음 (in-flight future가 소유)
struct Inner {
    config: AgentConfig,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn DeviceIdentityProvider>,
    enroller: Arc<dyn Enroller>,
    state: RwLock<CredentialState>,
    /// 남아있는 enrollment secret이 비어있음을 확인했는지
    secret_cleared: AtomicBool,
}

pub struct CredentialManager {
    inner: Arc<Inner>,
    /// 진행 중인 부트스트랩 (id, future)
    in_flight: Mutex<Option<(u64, Flight)>>,
    next_flight_id: AtomicU64,
}

impl CredentialManager {
    pub fn new(
        config: AgentConfig,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn DeviceIdentityProvider>,
        enroller: Arc<dyn Enroller>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                identity,
                enroller,
                state: RwLock::new(CredentialState::NoCredential),
                secret_cleared: AtomicBool::new(false),
            }),
            in_flight: Mutex::new(None),
            next_flight_id: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.config.namespace
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    pub async fn state(&self) -> CredentialState {
        *self.inner.state.read().await
    }

    /// API 키 조회 (실패 시 `None`)
    ///
    /// `None`은 "지금은 인증할 수 없음"을 의미합니다. 원인은 로그로만 남습니다.
    pub async fn get_credential(&self) -> Option<ApiKey> {
        self.try_get_credential().await.ok()
    }

    /// API 키 조회 (실패 원인 포함)
    pub async fn try_get_credential(&self) -> Result<ApiKey, CredentialError> {
        if let Some(key) = self.inner.read_api_key().await {
            self.inner.set_state(CredentialState::HasCredential).await;
            self.inner.clear_leftover_secret().await;
            return Ok(key);
        }

        let (id, flight) = self.join_or_start_flight().await;
        let outcome = flight.await;

        let mut slot = self.in_flight.lock().await;
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }

        outcome
    }

    /// 저장된 디바이스 ID
    pub async fn device_id(&self) -> Option<String> {
        let inner = &self.inner;
        match inner.store.get(&inner.config.namespace, KEY_DEVICE_ID).await {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!(key = KEY_DEVICE_ID, error = %e, "Failed to read device id");
                None
            }
        }
    }

    async fn join_or_start_flight(&self) -> (u64, Flight) {
        let mut slot = self.in_flight.lock().await;
        if let Some((id, flight)) = slot.as_ref() {
            // 결과가 이미 나온 flight는 대기자가 정리하지 못한 것이므로 재사용하지 않음
            if flight.peek().is_none() {
                debug!(flight = id, "Joining in-flight bootstrap");
                return (*id, flight.clone());
            }
            debug!(flight = id, "Discarding resolved bootstrap");
        }

        let id = self.next_flight_id.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let flight = async move { inner.bootstrap().await }.boxed().shared();
        *slot = Some((id, flight.clone()));
        (id, flight)
    }
}

impl Inner {
    async fn set_state(&self, state: CredentialState) {
        *self.state.write().await = state;
    }

    /// 저장된 API 키 (읽기 실패는 없음으로 취급하여 재부트스트랩으로 진행)
    async fn read_api_key(&self) -> Option<ApiKey> {
        match self.store.get(&self.config.namespace, KEY_API_KEY).await {
            Ok(Some(value)) if !value.trim().is_empty() => Some(Secret::new(value)),
            Ok(_) => None,
            Err(e) => {
                warn!(stage = %Stage::ReadApiKey, error = %e, "Failed to read cached API key");
                None
            }
        }
    }

    /// 이전 실행에서 지우지 못한 secret 정리 (실패해도 무시)
    async fn clear_leftover_secret(&self) {
        if self.secret_cleared.load(Ordering::SeqCst) {
            return;
        }
        let ns = &self.config.namespace;
        match self.store.get(ns, KEY_ENROLLMENT_SECRET).await {
            Ok(Some(value)) if !value.is_empty() => {
                if self.clear_secret().await {
                    info!("Cleared leftover enrollment secret");
                }
            }
            Ok(_) => self.secret_cleared.store(true, Ordering::SeqCst),
            Err(e) => {
                debug!(stage = %Stage::ReadSecret, error = %e, "Skipping leftover secret check");
            }
        }
    }

    async fn clear_secret(&self) -> bool {
        match self
            .store
            .set(&self.config.namespace, KEY_ENROLLMENT_SECRET, "")
            .await
        {
            Ok(()) => {
                self.secret_cleared.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!(stage = %Stage::ClearSecret, error = %e, "Failed to clear enrollment secret");
                false
            }
        }
    }

    async fn bootstrap(self: Arc<Self>) -> BootstrapOutcome {
        self.set_state(CredentialState::Bootstrapping).await;

        match self.run_bootstrap().await {
            Ok(key) => {
                self.set_state(CredentialState::HasCredential).await;
                Ok(key)
            }
            Err(e) => {
                if let CredentialError::RegistrationRejected { status, body } = &e {
                    debug!(status, body = %body, "Registration rejection body");
                }
                error!(kind = e.kind(), error = %e, "Credential bootstrap failed");
                self.set_state(CredentialState::Failed).await;
                Err(e)
            }
        }
    }

    async fn run_bootstrap(&self) -> BootstrapOutcome {
        let ns = &self.config.namespace;

        // 대기 중에 다른 부트스트랩이 완료되었을 수 있음
        if let Some(key) = self.read_api_key().await {
            debug!("API key appeared before bootstrap started");
            return Ok(key);
        }

        let secret = self
            .store
            .get(ns, KEY_ENROLLMENT_SECRET)
            .await
            .map_err(|e| CredentialError::StoreUnavailable {
                stage: Stage::ReadSecret,
                reason: e.to_string(),
            })?
            .map(Secret::new)
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::MissingProvisioningInfo("enrollment secret"))?;

        let device_name = self
            .identity
            .current_device_name()
            .ok_or(CredentialError::MissingProvisioningInfo("device name"))?;

        let stored_endpoint = match self.store.get(ns, KEY_API_ENDPOINT).await {
            Ok(value) => value,
            Err(e) => {
                warn!(stage = %Stage::ReadEndpoint, error = %e, "Using configured API endpoint");
                None
            }
        };
        let endpoint = self.config.bootstrap_url(stored_endpoint.as_deref())?;

        info!(endpoint = %endpoint, device_name = %device_name, "Registering device");
        let credential = self
            .enroller
            .bootstrap(&endpoint, &secret, &device_name)
            .await?;

        self.store
            .set(ns, KEY_API_KEY, credential.api_key.expose())
            .await
            .map_err(|e| CredentialError::StoreUnavailable {
                stage: Stage::WriteApiKey,
                reason: e.to_string(),
            })?;

        if let Err(e) = self.store.set(ns, KEY_DEVICE_ID, &credential.device_id).await {
            warn!(stage = %Stage::WriteDeviceId, error = %e, "Failed to persist device id");
        }

        self.clear_secret().await;

        info!(device_id = %credential.device_id, "Device registered");
        Ok(credential.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StaticDeviceName;
    use crate::secret::Credential;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use url::Url;

    const NS: &str = "SOFTWARE\\MSPByte\\MSPAgent";

    struct StubEnroller {
        calls: AtomicUsize,
        last_endpoint: std::sync::Mutex<Option<String>>,
    }

    impl StubEnroller {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_endpoint: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Enroller for StubEnroller {
        async fn bootstrap(
            &self,
            endpoint: &Url,
            _secret: &Secret,
            _device_name: &str,
        ) -> Result<Credential, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_endpoint.lock().unwrap() = Some(endpoint.to_string());
            Ok(Credential {
                api_key: Secret::new("K"),
                device_id: "D".to_string(),
            })
        }
    }

    fn manager(store: Arc<MemoryStore>, enroller: Arc<StubEnroller>) -> CredentialManager {
        CredentialManager::new(
            AgentConfig::default(),
            store,
            Arc::new(StaticDeviceName(Some("WS-01".to_string()))),
            enroller,
        )
    }

    #[tokio::test]
    async fn test_stored_endpoint_is_used() {
        let store = Arc::new(MemoryStore::with_entries(
            NS,
            [("EnrollmentSecret", "s"), ("APIEndpoint", "https://rmm.example.com")],
        ));
        let enroller = Arc::new(StubEnroller::new());
        let manager = manager(store, enroller.clone());

        manager.try_get_credential().await.unwrap();
        assert_eq!(
            enroller.last_endpoint.lock().unwrap().as_deref(),
            Some("https://rmm.example.com/api/agent/bootstrap")
        );
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let store = Arc::new(MemoryStore::new());
        let enroller = Arc::new(StubEnroller::new());
        let manager = manager(store.clone(), enroller);
        assert_eq!(manager.state().await, CredentialState::NoCredential);

        assert!(manager.get_credential().await.is_none());
        assert_eq!(manager.state().await, CredentialState::Failed);

        store.set(NS, "EnrollmentSecret", "s").await.unwrap();
        assert!(manager.get_credential().await.is_some());
        assert_eq!(manager.state().await, CredentialState::HasCredential);
    }

    #[tokio::test]
    async fn test_leftover_secret_cleared_on_fast_path() {
        let store = Arc::new(MemoryStore::with_entries(
            NS,
            [("APIKey", "cached"), ("EnrollmentSecret", "stale")],
        ));
        let enroller = Arc::new(StubEnroller::new());
        let manager = manager(store.clone(), enroller.clone());

        let key = manager.get_credential().await.unwrap();
        assert_eq!(key.expose(), "cached");
        assert_eq!(store.peek(NS, "EnrollmentSecret").await.as_deref(), Some(""));
        assert_eq!(enroller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_api_key_write_failure_keeps_secret() {
        let store = Arc::new(MemoryStore::with_entries(NS, [("EnrollmentSecret", "s")]));
        store.set_fail_writes_for(Some("APIKey")).await;
        let manager = manager(store.clone(), Arc::new(StubEnroller::new()));

        let err = manager.try_get_credential().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::StoreUnavailable { stage: Stage::WriteApiKey, .. }
        ));
        assert_eq!(store.peek(NS, "EnrollmentSecret").await.as_deref(), Some("s"));
    }

    #[tokio::test]
    async fn test_secret_clear_failure_still_returns_key() {
        let store = Arc::new(MemoryStore::with_entries(NS, [("EnrollmentSecret", "s")]));
        store.set_fail_writes_for(Some("EnrollmentSecret")).await;
        let manager = manager(store.clone(), Arc::new(StubEnroller::new()));

        let key = manager.try_get_credential().await.unwrap();
        assert_eq!(key.expose(), "K");
        assert_eq!(store.peek(NS, "APIKey").await.as_deref(), Some("K"));
        assert_eq!(store.peek(NS, "EnrollmentSecret").await.as_deref(), Some("s"));

        // 다음 호출에서 정리
        store.set_fail_writes_for(None).await;
        manager.try_get_credential().await.unwrap();
        assert_eq!(store.peek(NS, "EnrollmentSecret").await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_resolved_flight_left_in_slot_is_not_reused() {
        let store = Arc::new(MemoryStore::with_entries(NS, [("EnrollmentSecret", "s")]));
        let enroller = Arc::new(StubEnroller::new());
        let manager = manager(store, enroller.clone());

        // 정리되지 못한 채 남은 실패 결과
        let stale: Flight = async { Err::<ApiKey, _>(CredentialError::NetworkFailure("timed out".to_string())) }
            .boxed()
            .shared();
        assert!(stale.clone().await.is_err());
        *manager.in_flight.lock().await = Some((99, stale));

        let key = manager.try_get_credential().await.unwrap();
        assert_eq!(key.expose(), "K");
        assert_eq!(enroller.calls.load(Ordering::SeqCst), 1);
        assert!(manager.in_flight.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_device_id_reads_store() {
        let store = Arc::new(MemoryStore::with_entries(NS, [("DeviceID", "dev-9")]));
        let manager = manager(store, Arc::new(StubEnroller::new()));
        assert_eq!(manager.device_id().await.as_deref(), Some("dev-9"));
    }
}
