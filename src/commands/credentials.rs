//! Credential Commands
//!
//! WebView는 API 키가 필요할 때 `get_api_key`만 호출합니다.
//! 실패 원인은 노출하지 않고 "인증 불가" 단일 에러로 응답합니다.
//!
//! 명령 본문은 `CredentialManager`를 인자로 받는 함수로 두고,
//! `tauri` feature에서는 전역 `CREDENTIALS`로 감싼 `#[tauri::command]`만 추가합니다.

use crate::credentials::CredentialManager;
use crate::device::DeviceIdentityProvider;
use crate::error::{CommandError, CommandResult};
use crate::secret::ApiKey;
use crate::store::{KEY_API_ENDPOINT, KEY_DEVICE_ID};

/// 플러그인이 노출하는 명령 목록 (build.rs 권한 생성과 동일하게 유지)
pub const COMMANDS: &[&str] = &[
    "get_api_key",
    "get_device_id",
    "get_device_name",
    "read_store_value",
    "write_store_value",
];

/// WebView에서 읽을 수 있는 키 (비밀 값 제외)
const READABLE_KEYS: &[&str] = &[KEY_DEVICE_ID, KEY_API_ENDPOINT];
/// WebView에서 쓸 수 있는 키
const WRITABLE_KEYS: &[&str] = &[KEY_API_ENDPOINT];

fn ensure_allowed(key: &str, allowed: &[&str]) -> CommandResult<()> {
    if allowed.contains(&key) {
        return Ok(());
    }
    Err(CommandError {
        code: "KEY_NOT_ALLOWED".to_string(),
        message: format!("Access to store key '{}' is not allowed", key),
        details: None,
    })
}

fn unavailable(what: &str) -> CommandError {
    CommandError {
        code: "NOT_AVAILABLE".to_string(),
        message: format!("{} is not available", what),
        details: None,
    }
}

/// API 키 조회 (필요 시 디바이스 등록 수행)
pub async fn api_key(manager: &CredentialManager) -> CommandResult<ApiKey> {
    manager
        .try_get_credential()
        .await
        .map_err(CommandError::from)
}

/// 호스트 디바이스 이름
pub fn device_name(provider: &dyn DeviceIdentityProvider) -> CommandResult<String> {
    provider
        .current_device_name()
        .ok_or_else(|| unavailable("Device name"))
}

/// 에이전트 저장 영역 값 조회 (허용된 키만)
pub async fn read_store_value_with(
    manager: &CredentialManager,
    key: &str,
) -> CommandResult<Option<String>> {
    ensure_allowed(key, READABLE_KEYS)?;
    Ok(manager.store().get(manager.namespace(), key).await?)
}

/// 에이전트 저장 영역 값 저장 (허용된 키만)
pub async fn write_store_value_with(
    manager: &CredentialManager,
    key: &str,
    value: &str,
) -> CommandResult<()> {
    ensure_allowed(key, WRITABLE_KEYS)?;
    Ok(manager.store().set(manager.namespace(), key, value).await?)
}

#[cfg(feature = "tauri")]
pub mod tauri_commands {
    use super::*;
    use crate::credentials::CREDENTIALS;
    use crate::device::HostnameProvider;

    #[tauri::command]
    pub async fn get_api_key() -> CommandResult<ApiKey> {
        api_key(&CREDENTIALS).await
    }

    /// 등록된 디바이스 ID
    #[tauri::command]
    pub async fn get_device_id() -> CommandResult<Option<String>> {
        Ok(CREDENTIALS.device_id().await)
    }

    #[tauri::command]
    pub fn get_device_name() -> CommandResult<String> {
        device_name(&HostnameProvider)
    }

    #[tauri::command]
    pub async fn read_store_value(key: String) -> CommandResult<Option<String>> {
        read_store_value_with(&CREDENTIALS, &key).await
    }

    #[tauri::command]
    pub async fn write_store_value(key: String, value: String) -> CommandResult<()> {
        write_store_value_with(&CREDENTIALS, &key, &value).await
    }
}
