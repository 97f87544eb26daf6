//! MSP Agent Error Types
//!
//! 자격증명 부트스트랩 과정의 에러 타입 정의.
//! 에러 메시지에는 enrollment secret / API 키 값이 절대 포함되지 않습니다.

use serde::Serialize;
use thiserror::Error;

/// 응답 본문을 에러에 담을 때의 최대 길이
const MAX_BODY_LEN: usize = 512;

/// 실패한 부트스트랩 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadApiKey,
    ReadSecret,
    ReadEndpoint,
    WriteApiKey,
    WriteDeviceId,
    ClearSecret,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ReadApiKey => "read_api_key",
            Stage::ReadSecret => "read_enrollment_secret",
            Stage::ReadEndpoint => "read_api_endpoint",
            Stage::WriteApiKey => "write_api_key",
            Stage::WriteDeviceId => "write_device_id",
            Stage::ClearSecret => "clear_enrollment_secret",
        };
        f.write_str(name)
    }
}

/// 자격증명 획득 실패 원인
///
/// 단일 부트스트랩 결과를 모든 대기자에게 전달해야 하므로 `Clone`입니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Store unavailable at {stage}: {reason}")]
    StoreUnavailable { stage: Stage, reason: String },

    #[error("Missing provisioning info: {0}")]
    MissingProvisioningInfo(&'static str),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Registration rejected with status {status}")]
    RegistrationRejected { status: u16, body: String },

    #[error("Malformed registration response: {0}")]
    MalformedResponse(String),
}

impl CredentialError {
    /// 거부 응답 본문을 잘라서 보관
    pub fn rejected(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_BODY_LEN) {
            Some((idx, _)) => body[..idx].to_string(),
            None => body.to_string(),
        };
        CredentialError::RegistrationRejected { status, body }
    }

    /// 로그 필드용 짧은 분류명
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialError::StoreUnavailable { .. } => "store_unavailable",
            CredentialError::MissingProvisioningInfo(_) => "missing_provisioning_info",
            CredentialError::NetworkFailure(_) => "network_failure",
            CredentialError::RegistrationRejected { .. } => "registration_rejected",
            CredentialError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Tauri 명령 응답용 직렬화 가능한 에러
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<CredentialError> for CommandError {
    fn from(_: CredentialError) -> Self {
        // 호출자에게는 원인 분류를 노출하지 않음
        CommandError {
            code: "CREDENTIAL_UNAVAILABLE".to_string(),
            message: "Could not authenticate this device".to_string(),
            details: None,
        }
    }
}

impl From<crate::store::StoreError> for CommandError {
    fn from(error: crate::store::StoreError) -> Self {
        CommandError {
            code: "STORE_ERROR".to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

/// Tauri 명령 결과 타입
pub type CommandResult<T> = Result<T, CommandError>;
