//! Persistent Key-Value Store 모듈
//!
//! (namespace, key) → 문자열 값 저장소 추상화.
//!
//! - `RegistryStore`: Windows 레지스트리 (HKLM, 설치 프로그램이 enrollment secret을 기록하는 위치)
//! - `KeyringStore`: OS 키체인/키링 (macOS Keychain, Secret Service)
//! - `MemoryStore`: 테스트 및 헤드리스 실행용 메모리 저장소
//!
//! 키가 없는 것은 에러가 아니라 "아직 프로비저닝되지 않음" 상태입니다.

pub mod keyring;
pub mod memory;
#[cfg(windows)]
pub mod registry;

use async_trait::async_trait;

pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;
#[cfg(windows)]
pub use self::registry::RegistryStore;

/// 발급된 API 키
pub const KEY_API_KEY: &str = "APIKey";
/// 서버가 부여한 디바이스 ID
pub const KEY_DEVICE_ID: &str = "DeviceID";
/// 1회용 enrollment secret (외부 프로비저닝 단계에서 기록)
pub const KEY_ENROLLMENT_SECRET: &str = "EnrollmentSecret";
/// 등록 엔드포인트 주소 (선택)
pub const KEY_API_ENDPOINT: &str = "APIEndpoint";

/// 저장소 오류
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Stored value is corrupted: {0}")]
    Corrupted(String),

    #[error("Store key must not be empty")]
    InvalidKey,
}

/// 영속 키-값 저장소
///
/// 두 연산 모두 실패할 수 있지만 panic 없이 `StoreError`로 반환합니다.
/// 여러 키에 걸친 트랜잭션은 보장하지 않습니다.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 값 조회 (`Ok(None)` = 키 없음)
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// 값 저장 (없으면 생성, 있으면 덮어씀)
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError>;
}

pub(crate) fn validate_key(namespace: &str, key: &str) -> Result<(), StoreError> {
    if namespace.trim().is_empty() || key.trim().is_empty() {
        return Err(StoreError::InvalidKey);
    }
    Ok(())
}

/// 블로킹 백엔드 호출을 별도 스레드에서 실행
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
}

/// 파일/레지스트리 I/O 오류 분류 (`NotFound`는 호출 측에서 `None`으로 처리)
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn map_io_error(err: std::io::Error) -> StoreError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(err.to_string()),
        std::io::ErrorKind::InvalidData => StoreError::Corrupted(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}
