//! 에이전트 설정
//!
//! `.env` (dotenvy) 와 프로세스 환경변수에서 설정을 읽습니다.
//! 빈 문자열로 주입된 값은 설정되지 않은 것으로 취급합니다.

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::CredentialError;

/// 에이전트 저장 영역 (기본 namespace)
pub const DEFAULT_NAMESPACE: &str = "SOFTWARE\\MSPByte\\MSPAgent";
/// 등록 서버 기본 주소
pub const DEFAULT_API_BASE: &str = "http://localhost:3000";
/// 부트스트랩 경로
pub const BOOTSTRAP_PATH: &str = "api/agent/bootstrap";
/// HTTP 요청 타임아웃 기본값 (초)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_NAMESPACE: &str = "MSPAGENT_NAMESPACE";
const ENV_API_ENDPOINT: &str = "MSPAGENT_API_ENDPOINT";
const ENV_HTTP_TIMEOUT: &str = "MSPAGENT_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub namespace: String,
    /// 저장소의 `APIEndpoint` 가 없을 때 사용할 서버 주소
    pub endpoint_override: Option<String>,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            endpoint_override: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AgentConfig {
    /// 임의의 조회 함수로부터 설정 구성
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let request_timeout = non_empty(lookup(ENV_HTTP_TIMEOUT))
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            namespace: non_empty(lookup(ENV_NAMESPACE)).unwrap_or(defaults.namespace),
            endpoint_override: non_empty(lookup(ENV_API_ENDPOINT)),
            request_timeout,
        }
    }

    /// `.env` 로드 후 프로세스 환경변수에서 설정 구성
    pub fn from_env() -> Self {
        // production에서는 .env가 없을 수 있으므로 실패해도 무시
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 지정한 env 파일 값을 우선 사용 (프로세스 환경은 변경하지 않음)
    pub fn from_env_file(path: &Path) -> Result<Self, dotenvy::Error> {
        let mut file_values = std::collections::HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            file_values.insert(key, value);
        }
        Ok(Self::from_lookup(|key| {
            non_empty(file_values.get(key).cloned()).or_else(|| std::env::var(key).ok())
        }))
    }

    /// 등록 엔드포인트 URL 결정
    ///
    /// 우선순위: 저장소 `APIEndpoint` > `endpoint_override` > 기본 주소
    pub fn bootstrap_url(&self, stored_endpoint: Option<&str>) -> Result<Url, CredentialError> {
        let base = stored_endpoint
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(self.endpoint_override.as_deref())
            .unwrap_or(DEFAULT_API_BASE);

        // join 시 마지막 경로 세그먼트가 유지되도록 '/'로 끝나게 맞춤
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };

        Url::parse(&base)
            .and_then(|url| url.join(BOOTSTRAP_PATH))
            .map_err(|e| CredentialError::NetworkFailure(format!("invalid API endpoint: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AgentConfig::from_lookup(|_| None);
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            (ENV_NAMESPACE, "  "),
            (ENV_API_ENDPOINT, ""),
            (ENV_HTTP_TIMEOUT, "abc"),
        ]));
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            (ENV_NAMESPACE, "SOFTWARE\\Acme\\Agent"),
            (ENV_API_ENDPOINT, "https://rmm.example.com"),
            (ENV_HTTP_TIMEOUT, "5"),
        ]));
        assert_eq!(config.namespace, "SOFTWARE\\Acme\\Agent");
        assert_eq!(config.endpoint_override.as_deref(), Some("https://rmm.example.com"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bootstrap_url_precedence() {
        let config = AgentConfig {
            endpoint_override: Some("https://override.example.com".to_string()),
            ..AgentConfig::default()
        };

        let url = config.bootstrap_url(Some("https://stored.example.com/base")).unwrap();
        assert_eq!(url.as_str(), "https://stored.example.com/base/api/agent/bootstrap");

        let url = config.bootstrap_url(Some("   ")).unwrap();
        assert_eq!(url.as_str(), "https://override.example.com/api/agent/bootstrap");

        let url = AgentConfig::default().bootstrap_url(None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/agent/bootstrap");
    }

    #[test]
    fn test_invalid_endpoint_is_network_failure() {
        let err = AgentConfig::default().bootstrap_url(Some("not a url")).unwrap_err();
        assert!(matches!(err, CredentialError::NetworkFailure(_)));
    }

    #[test]
    fn test_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MSPAGENT_API_ENDPOINT=https://file.example.com").unwrap();
        writeln!(file, "MSPAGENT_HTTP_TIMEOUT_SECS=12").unwrap();

        let config = AgentConfig::from_env_file(file.path()).unwrap();
        assert_eq!(config.endpoint_override.as_deref(), Some("https://file.example.com"));
        assert_eq!(config.request_timeout, Duration::from_secs(12));
    }
}
