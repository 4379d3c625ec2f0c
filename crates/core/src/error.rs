//! 에러 타입 -- 도메인별 에러 정의

/// hikup 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HikupError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 데몬 설정(`hikup.toml`)과 업데이트 정책 파일 로딩 모두 이 타입을 사용합니다.
/// 정책 로딩 실패는 항상 복구 가능하며, 이전 정책이 그대로 유지됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파일 읽기 실패
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// 지원하지 않는 파일 확장자
    #[error("unsupported config file format: '{extension}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat { extension: String },

    /// 파일 크기 초과
    #[error("config file too large: {path}: {size} bytes (max: {max})")]
    TooLarge { path: String, size: u64, max: u64 },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
