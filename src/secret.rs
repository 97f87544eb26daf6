//! 시크릿 문자열 래퍼
//!
//! `Debug` 출력 시 값을 가리고, drop 시 메모리를 zeroize 합니다.

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 민감한 문자열 (enrollment secret, API 키)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

/// 장기 API 자격증명
pub type ApiKey = Secret;

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 원문 노출 (Authorization 헤더 구성 등 즉시 사용 용도)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for Secret {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// 등록 결과로 받은 자격증명
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: ApiKey,
    pub device_id: String,
}
