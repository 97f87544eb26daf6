//! Enrollment Client
//!
//! enrollment secret + 디바이스 이름을 등록 엔드포인트에 보내고
//! API 키와 디바이스 ID를 받아옵니다. 네트워크 I/O를 수행하는 유일한 컴포넌트입니다.
//!
//! - 엔드포인트는 bearer 토큰을 요구하지 않음 (secret 자체가 최초 사용 자격증명)
//! - 재시도 없음 (재시도 정책은 호출자 책임)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::CredentialError;
use crate::secret::{Credential, Secret};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapRequest<'a> {
    enrollment_secret: &'a str,
    device_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapResponse {
    api_key: Option<String>,
    device_id: Option<String>,
}

/// 1회성 등록 교환
#[async_trait]
pub trait Enroller: Send + Sync {
    async fn bootstrap(
        &self,
        endpoint: &Url,
        secret: &Secret,
        device_name: &str,
    ) -> Result<Credential, CredentialError>;
}

/// reqwest 기반 등록 클라이언트
pub struct HttpEnrollmentClient {
    http: reqwest::Client,
}

impl HttpEnrollmentClient {
    pub fn new(timeout: Duration) -> Result<Self, CredentialError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::NetworkFailure(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// 외부에서 구성한 클라이언트 사용
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// 성공 응답 본문 파싱 (두 필드 모두 비어있지 않아야 함)
fn parse_credential(body: &str) -> Result<Credential, CredentialError> {
    let data: BootstrapResponse = serde_json::from_str(body)
        .map_err(|e| CredentialError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let api_key = data
        .api_key
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CredentialError::MalformedResponse("missing apiKey".to_string()))?;
    let device_id = data
        .device_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CredentialError::MalformedResponse("missing deviceId".to_string()))?;

    Ok(Credential {
        api_key: Secret::new(api_key),
        device_id,
    })
}

#[async_trait]
impl Enroller for HttpEnrollmentClient {
    async fn bootstrap(
        &self,
        endpoint: &Url,
        secret: &Secret,
        device_name: &str,
    ) -> Result<Credential, CredentialError> {
        let request_body = BootstrapRequest {
            enrollment_secret: secret.expose(),
            device_name,
        };

        debug!(endpoint = %endpoint, device_name = %device_name, "Sending bootstrap request");

        let response = self
            .http
            .post(endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CredentialError::NetworkFailure(format!("failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::NetworkFailure(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CredentialError::rejected(status.as_u16(), &body));
        }

        parse_credential(&body)
    }
}
