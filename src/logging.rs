//! 로깅 초기화
//!
//! stdout + (선택) 로그 폴더의 일 단위 롤링 파일에 기록합니다.
//! `RUST_LOG`가 없으면 `mspagent_lib=info`로 동작합니다.

use std::path::Path;

use tracing::warn;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "mspagent_lib=info";
/// 헤드리스 실행 시 기본 로그 폴더 (작업 디렉토리 기준)
pub const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "mspagent";

/// 로그 폴더에 `mspagent.YYYY-MM-DD.log` 형식으로 기록하는 appender (오래된 파일은 모두 보존)
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
}

/// tracing subscriber 설치 (이미 설치되어 있으면 무시)
///
/// `log_dir`이 주어졌지만 파일을 열 수 없으면 stdout만 사용합니다.
pub fn init(log_dir: Option<&Path>) {
    let mut file_error = None;
    let file_layer = log_dir.and_then(|dir| match file_appender(dir) {
        Ok(appender) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender),
        ),
        Err(e) => {
            file_error = Some(e.to_string());
            None
        }
    });

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (true, Some(error)) = (installed, file_error) {
        warn!(error = %error, "File logging disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_init_is_idempotent() {
        init(None);
        init(None);
        tracing::info!("logging initialized twice");
    }

    #[test]
    fn test_file_appender_writes_into_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = file_appender(dir.path()).unwrap();
        appender.write_all(b"device registered\n").unwrap();
        appender.flush().unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("mspagent."));
        assert!(files[0].ends_with(".log"));

        let content = std::fs::read_to_string(dir.path().join(&files[0])).unwrap();
        assert!(content.contains("device registered"));
    }

    #[test]
    fn test_init_with_log_dir_falls_back_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let missing_parent = dir.path().join("file.txt");
        std::fs::write(&missing_parent, b"not a directory").unwrap();
        init(Some(&missing_parent.join("logs")));
    }
}
