//! Device Identity Provider
//!
//! 등록 요청에 함께 보내는 사람이 읽을 수 있는 디바이스 이름을 제공합니다.
//! 비밀 값이 아니며 평문으로 전송됩니다.

use tracing::warn;

/// 현재 호스트의 디바이스 이름 제공자
pub trait DeviceIdentityProvider: Send + Sync {
    /// 디바이스 이름 (플랫폼 오류 시 `None`)
    fn current_device_name(&self) -> Option<String>;
}

/// OS 호스트 이름 기반 제공자
#[derive(Debug, Default, Clone)]
pub struct HostnameProvider;

impl DeviceIdentityProvider for HostnameProvider {
    fn current_device_name(&self) -> Option<String> {
        match hostname::get() {
            Ok(name) => normalize(&name.to_string_lossy()),
            Err(e) => {
                warn!(error = %e, "Failed to resolve host name");
                None
            }
        }
    }
}

/// 고정된 이름 (테스트, 수동 지정용)
#[derive(Debug, Clone)]
pub struct StaticDeviceName(pub Option<String>);

impl DeviceIdentityProvider for StaticDeviceName {
    fn current_device_name(&self) -> Option<String> {
        self.0.as_deref().and_then(normalize)
    }
}

fn normalize(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        warn!("Host name is empty");
        return None;
    }
    Some(name.to_string())
}
