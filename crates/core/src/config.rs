//! 설정 관리 -- hikup.toml 파싱 및 런타임 설정
//!
//! [`HikupConfig`]는 데몬의 모든 설정을 담는 최상위 구조체입니다.
//! 업데이트 대상 컨테이너를 고르는 include/exclude 정책은 여기에 포함되지 않으며,
//! 별도의 정책 파일(JSON/YAML)로 관리되어 SIGHUP으로 다시 읽힙니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`HIKUP_UPDATER_POLL_INTERVAL_SECS=600` 형식)
//! 3. 설정 파일 (`hikup.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), hikup_core::error::HikupError> {
//! use hikup_core::config::HikupConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HikupConfig::load("hikup.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HikupConfig::parse("[updater]\npoll_interval_secs = 600")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HikupError};

/// 설정 상한값 상수
const MAX_POLL_INTERVAL_SECS: u64 = 7 * 24 * 3600;
const MAX_STOP_GRACE_SECS: u64 = 300;
const MAX_OPERATION_TIMEOUT_SECS: u64 = 3600;
const MAX_CONCURRENT_RECREATIONS: usize = 32;

/// hikup 통합 설정
///
/// `hikup.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HikupConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker 연결 설정
    #[serde(default)]
    pub docker: DockerConfig,
    /// 업데이트 스케줄러 설정
    #[serde(default)]
    pub updater: UpdaterSettings,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl HikupConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HikupError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 주어지지 않았을 때 기본값에 환경변수만 적용합니다.
    pub fn from_env() -> Result<Self, HikupError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HikupError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HikupError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HikupError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HikupError> {
        toml::from_str(toml_str).map_err(|e| {
            HikupError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `HIKUP_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "HIKUP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "HIKUP_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "HIKUP_GENERAL_PID_FILE");

        // Docker
        override_string(&mut self.docker.socket, "HIKUP_DOCKER_SOCKET");
        override_u64(
            &mut self.docker.connect_timeout_secs,
            "HIKUP_DOCKER_CONNECT_TIMEOUT_SECS",
        );

        // Updater
        override_u64(
            &mut self.updater.poll_interval_secs,
            "HIKUP_UPDATER_POLL_INTERVAL_SECS",
        );
        override_u64(
            &mut self.updater.list_retry_backoff_secs,
            "HIKUP_UPDATER_LIST_RETRY_BACKOFF_SECS",
        );
        override_u64(
            &mut self.updater.stop_grace_secs,
            "HIKUP_UPDATER_STOP_GRACE_SECS",
        );
        override_u64(
            &mut self.updater.operation_timeout_secs,
            "HIKUP_UPDATER_OPERATION_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.updater.pull_timeout_secs,
            "HIKUP_UPDATER_PULL_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.updater.max_concurrent_recreations,
            "HIKUP_UPDATER_MAX_CONCURRENT_RECREATIONS",
        );
        override_parsed(
            &mut self.updater.recreate_strategy,
            "HIKUP_UPDATER_RECREATE_STRATEGY",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "HIKUP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "HIKUP_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "HIKUP_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HikupError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.docker.connect_timeout_secs == 0 {
            return Err(invalid(
                "docker.connect_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        self.updater.validate().map_err(|e| match e {
            ConfigError::InvalidValue { field, reason } => {
                invalid(&format!("updater.{field}"), reason)
            }
            other => other.into(),
        })?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must not be 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> HikupError {
    invalid_value(field, reason).into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_format: String,
    /// PID 파일 경로 (비어 있으면 기록하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker 소켓 경로 (비어 있으면 `DOCKER_HOST` 등 로컬 기본값 사용)
    pub socket: String,
    pub connect_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: String::new(),
            connect_timeout_secs: 120,
        }
    }
}

/// 재생성 전략
///
/// - `Shadow`: 원본을 삭제하지 않고 이름을 바꿔 두었다가, 새 컨테이너가
///   실행 중임을 확인한 뒤에 삭제합니다. 생성/시작 실패 시 원본을 복구합니다.
/// - `Replace`: 원본을 삭제한 뒤 새로 생성합니다 (stop → remove → create → start).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecreateStrategy {
    #[default]
    Shadow,
    Replace,
}

impl fmt::Display for RecreateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shadow => write!(f, "shadow"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for RecreateStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shadow" => Ok(Self::Shadow),
            "replace" => Ok(Self::Replace),
            other => Err(ConfigError::InvalidValue {
                field: "updater.recreate_strategy".to_owned(),
                reason: format!("unknown strategy '{other}', expected 'shadow' or 'replace'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterSettings {
    /// 업데이트 주기 (초)
    pub poll_interval_secs: u64,
    /// 컨테이너 목록 조회 실패 시 재시도 간격 (초)
    pub list_retry_backoff_secs: u64,
    /// stop 유예 시간 (초), 이후 런타임이 강제 종료
    pub stop_grace_secs: u64,
    /// 런타임 호출 1회당 데드라인 (초)
    pub operation_timeout_secs: u64,
    /// 이미지 pull 데드라인 (초)
    pub pull_timeout_secs: u64,
    /// 동시에 재생성할 최대 컨테이너 수 (1이면 순차 처리)
    pub max_concurrent_recreations: usize,
    pub recreate_strategy: RecreateStrategy,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            list_retry_backoff_secs: 60,
            stop_grace_secs: 10,
            operation_timeout_secs: 60,
            pull_timeout_secs: 600,
            max_concurrent_recreations: 1,
            recreate_strategy: RecreateStrategy::Shadow,
        }
    }
}

impl UpdaterSettings {
    /// 업데이터 설정값의 범위를 검증합니다.
    ///
    /// 데몬 설정 검증과 업데이터 설정 검증이 모두 이 규칙을 사용합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(invalid_value(
                "poll_interval_secs",
                format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            ));
        }

        if self.list_retry_backoff_secs == 0 {
            return Err(invalid_value(
                "list_retry_backoff_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.stop_grace_secs > MAX_STOP_GRACE_SECS {
            return Err(invalid_value(
                "stop_grace_secs",
                format!("must be 0-{MAX_STOP_GRACE_SECS}"),
            ));
        }

        if self.operation_timeout_secs == 0
            || self.operation_timeout_secs > MAX_OPERATION_TIMEOUT_SECS
        {
            return Err(invalid_value(
                "operation_timeout_secs",
                format!("must be 1-{MAX_OPERATION_TIMEOUT_SECS}"),
            ));
        }

        // stop 호출은 유예 시간이 끝나야 반환되므로 데드라인이 더 길어야 함
        if self.operation_timeout_secs <= self.stop_grace_secs {
            return Err(invalid_value(
                "operation_timeout_secs",
                format!(
                    "must be greater than stop_grace_secs ({})",
                    self.stop_grace_secs
                ),
            ));
        }

        if self.pull_timeout_secs == 0 || self.pull_timeout_secs > MAX_OPERATION_TIMEOUT_SECS
        {
            return Err(invalid_value(
                "pull_timeout_secs",
                format!("must be 1-{MAX_OPERATION_TIMEOUT_SECS}"),
            ));
        }

        if self.max_concurrent_recreations == 0
            || self.max_concurrent_recreations > MAX_CONCURRENT_RECREATIONS
        {
            return Err(invalid_value(
                "max_concurrent_recreations",
                format!("must be 1-{MAX_CONCURRENT_RECREATIONS}"),
            ));
        }

        Ok(())
    }
}

fn invalid_value(field: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = HikupConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.updater.poll_interval_secs, 3600);
        assert_eq!(config.updater.list_retry_backoff_secs, 60);
        assert_eq!(config.updater.stop_grace_secs, 10);
        assert_eq!(config.updater.max_concurrent_recreations, 1);
        assert_eq!(config.updater.recreate_strategy, RecreateStrategy::Shadow);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        HikupConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = HikupConfig::parse("").unwrap();
        assert_eq!(config.updater.poll_interval_secs, 3600);
        assert!(config.docker.socket.is_empty());
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[updater]
poll_interval_secs = 600
recreate_strategy = "replace"
"#;
        let config = HikupConfig::parse(toml).unwrap();
        assert_eq!(config.updater.poll_interval_secs, 600);
        assert_eq!(config.updater.recreate_strategy, RecreateStrategy::Replace);
        // 나머지는 기본값 유지
        assert_eq!(config.updater.stop_grace_secs, 10);
        assert_eq!(config.general.log_format, "json");
    }

    #[test]
    fn parse_rejects_unknown_strategy() {
        let toml = r#"
[updater]
recreate_strategy = "yolo"
"#;
        assert!(HikupConfig::parse(toml).is_err());
    }

    #[test]
    fn parse_invalid_toml_is_parse_error() {
        let err = HikupConfig::parse("[updater\npoll = ").unwrap_err();
        assert!(matches!(
            err,
            HikupError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = HikupConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = HikupConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = HikupConfig::default();
        config.updater.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_operation_timeout_not_exceeding_grace() {
        let mut config = HikupConfig::default();
        config.updater.stop_grace_secs = 30;
        config.updater.operation_timeout_secs = 30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stop_grace_secs"));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = HikupConfig::default();
        config.updater.max_concurrent_recreations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn updater_errors_are_reported_under_updater_section() {
        let mut config = HikupConfig::default();
        config.updater.pull_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'updater.pull_timeout_secs'"));

        let err = config.updater.validate().unwrap_err();
        assert!(err.to_string().contains("'pull_timeout_secs'"));
    }

    #[test]
    fn validate_rejects_excessive_concurrency() {
        let mut config = HikupConfig::default();
        config.updater.max_concurrent_recreations = 33;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_boundary_values() {
        let mut config = HikupConfig::default();
        config.updater.poll_interval_secs = 1;
        config.updater.stop_grace_secs = 0;
        config.updater.operation_timeout_secs = 1;
        config.updater.pull_timeout_secs = 1;
        config.updater.max_concurrent_recreations = 32;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_metrics_port_when_enabled() {
        let mut config = HikupConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn strategy_from_str_is_case_insensitive() {
        assert_eq!(
            "Replace".parse::<RecreateStrategy>().unwrap(),
            RecreateStrategy::Replace
        );
        assert_eq!(
            "SHADOW".parse::<RecreateStrategy>().unwrap(),
            RecreateStrategy::Shadow
        );
        assert!("blue-green".parse::<RecreateStrategy>().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies_to_updater_fields() {
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe {
            std::env::set_var("HIKUP_UPDATER_POLL_INTERVAL_SECS", "120");
            std::env::set_var("HIKUP_UPDATER_RECREATE_STRATEGY", "replace");
        }
        let mut config = HikupConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("HIKUP_UPDATER_POLL_INTERVAL_SECS");
            std::env::remove_var("HIKUP_UPDATER_RECREATE_STRATEGY");
        }
        assert_eq!(config.updater.poll_interval_secs, 120);
        assert_eq!(config.updater.recreate_strategy, RecreateStrategy::Replace);
    }

    #[test]
    #[serial]
    fn env_override_ignores_unparseable_values() {
        unsafe {
            std::env::set_var("HIKUP_UPDATER_STOP_GRACE_SECS", "ten");
            std::env::set_var("HIKUP_METRICS_ENABLED", "maybe");
        }
        let mut config = HikupConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("HIKUP_UPDATER_STOP_GRACE_SECS");
            std::env::remove_var("HIKUP_METRICS_ENABLED");
        }
        assert_eq!(config.updater.stop_grace_secs, 10);
        assert!(!config.metrics.enabled);
    }

    #[tokio::test]
    async fn from_file_missing_is_file_not_found() {
        let err = HikupConfig::from_file("/nonexistent/hikup.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HikupError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hikup.toml");
        std::fs::write(&path, "[general]\nlog_format = \"pretty\"\n").unwrap();
        let config = HikupConfig::from_file(&path).await.unwrap();
        assert_eq!(config.general.log_format, "pretty");
    }
}
