//! Tauri Commands Module
//!
//! 데스크톱 셸(WebView)에서 호출 가능한 Tauri 명령어 정의

pub mod credentials;
