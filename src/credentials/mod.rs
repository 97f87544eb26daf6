//! Credential Manager 모듈
//!
//! 애플리케이션이 호출하는 유일한 진입점입니다.
//!
//! - 저장소에 API 키가 있으면 네트워크 접근 없이 즉시 반환
//! - 없으면 enrollment secret + 디바이스 이름으로 1회 등록 후 저장
//! - 동시 호출은 단일 부트스트랩(single-flight)으로 합쳐짐

pub mod manager;

pub use manager::{CredentialManager, CredentialState, CREDENTIALS};
