//! MSP Agent - 디바이스 자격증명 부트스트랩 라이브러리
//!
//! 1회용 enrollment secret을 등록 엔드포인트에서 장기 API 키로 교환하고,
//! OS 보안 저장소에 캐시하여 이후 호출에서는 네트워크 없이 반환합니다.

pub mod commands;
pub mod config;
pub mod credentials;
pub mod device;
pub mod enrollment;
pub mod error;
pub mod logging;
pub mod secret;
pub mod store;

pub use credentials::{CredentialManager, CredentialState, CREDENTIALS};
pub use error::CredentialError;
pub use secret::{ApiKey, Credential, Secret};

/// 데스크톱 셸에 등록할 Tauri 플러그인
///
/// 명령 권한은 build.rs가 생성하며, 앱 capability에 `mspagent:default`를 추가해야 합니다.
///
/// ```ignore
/// tauri::Builder::default().plugin(mspagent_lib::plugin())
/// ```
#[cfg(feature = "tauri")]
pub fn plugin<R: tauri::Runtime>() -> tauri::plugin::TauriPlugin<R> {
    tauri::plugin::Builder::new("mspagent")
        .setup(|app, _api| {
            use tauri::Manager;
            let log_dir = app.path().app_log_dir().ok();
            logging::init(log_dir.as_deref());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::credentials::tauri_commands::get_api_key,
            commands::credentials::tauri_commands::get_device_id,
            commands::credentials::tauri_commands::get_device_name,
            commands::credentials::tauri_commands::read_store_value,
            commands::credentials::tauri_commands::write_store_value,
        ])
        .build()
}
