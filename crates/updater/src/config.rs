//! 업데이터 설정
//!
//! [`UpdaterConfig`]는 core의 [`UpdaterSettings`](hikup_core::config::UpdaterSettings)를
//! 기반으로 실행 시점에만 결정되는 값(`--all`, 정책 파일 경로)을 더한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use hikup_core::config::HikupConfig;
//! use hikup_updater::config::UpdaterConfig;
//!
//! let core_config = HikupConfig::default();
//! let config = UpdaterConfig::from_core(&core_config.updater, false, None);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use hikup_core::config::{RecreateStrategy, UpdaterSettings};
use hikup_core::error::ConfigError;
use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;

/// 업데이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// 업데이트 주기 (초)
    pub poll_interval_secs: u64,
    /// 목록 조회 실패 시 재시도 간격 (초)
    pub list_retry_backoff_secs: u64,
    /// stop 유예 시간 (초)
    pub stop_grace_secs: u64,
    /// 런타임 호출 1회당 데드라인 (초)
    pub operation_timeout_secs: u64,
    /// 이미지 pull 데드라인 (초)
    pub pull_timeout_secs: u64,
    /// 동시 재생성 최대 수
    pub max_concurrent_recreations: usize,
    pub recreate_strategy: RecreateStrategy,

    // --- 실행 시점 설정 (CLI에서 결정) ---
    /// 정책과 무관하게 모든 컨테이너를 업데이트
    pub force_all: bool,
    /// 정책 파일 경로 (없으면 빈 정책, 리로드 불가)
    pub policy_path: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self::from_core(&UpdaterSettings::default(), false, None)
    }
}

impl UpdaterConfig {
    /// core의 `UpdaterSettings`에서 업데이터 설정을 생성합니다.
    pub fn from_core(
        core: &UpdaterSettings,
        force_all: bool,
        policy_path: Option<PathBuf>,
    ) -> Self {
        Self {
            poll_interval_secs: core.poll_interval_secs,
            list_retry_backoff_secs: core.list_retry_backoff_secs,
            stop_grace_secs: core.stop_grace_secs,
            operation_timeout_secs: core.operation_timeout_secs,
            pull_timeout_secs: core.pull_timeout_secs,
            max_concurrent_recreations: core.max_concurrent_recreations,
            recreate_strategy: core.recreate_strategy,
            force_all,
            policy_path,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn list_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.list_retry_backoff_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    /// 실행 시점 값을 뺀 core 설정으로 되돌립니다.
    pub fn to_core(&self) -> UpdaterSettings {
        UpdaterSettings {
            poll_interval_secs: self.poll_interval_secs,
            list_retry_backoff_secs: self.list_retry_backoff_secs,
            stop_grace_secs: self.stop_grace_secs,
            operation_timeout_secs: self.operation_timeout_secs,
            pull_timeout_secs: self.pull_timeout_secs,
            max_concurrent_recreations: self.max_concurrent_recreations,
            recreate_strategy: self.recreate_strategy,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 범위 규칙은 [`UpdaterSettings::validate`]와 같습니다.
    pub fn validate(&self) -> Result<(), UpdaterError> {
        self.to_core().validate().map_err(|e| match e {
            ConfigError::InvalidValue { field, reason } => UpdaterError::Config { field, reason },
            other => config_error("updater", other.to_string()),
        })
    }
}

fn config_error(field: &str, reason: String) -> UpdaterError {
    UpdaterError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// 업데이터 설정 빌더
#[derive(Default)]
pub struct UpdaterConfigBuilder {
    config: UpdaterConfig,
}

impl UpdaterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    pub fn list_retry_backoff_secs(mut self, secs: u64) -> Self {
        self.config.list_retry_backoff_secs = secs;
        self
    }

    pub fn stop_grace_secs(mut self, secs: u64) -> Self {
        self.config.stop_grace_secs = secs;
        self
    }

    pub fn operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.operation_timeout_secs = secs;
        self
    }

    pub fn pull_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pull_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_recreations(mut self, max: usize) -> Self {
        self.config.max_concurrent_recreations = max;
        self
    }

    pub fn recreate_strategy(mut self, strategy: RecreateStrategy) -> Self {
        self.config.recreate_strategy = strategy;
        self
    }

    /// `--all` 모드를 설정합니다.
    pub fn force_all(mut self, force_all: bool) -> Self {
        self.config.force_all = force_all;
        self
    }

    /// 정책 파일 경로를 설정합니다.
    pub fn policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.policy_path = Some(path.into());
        self
    }

    /// 설정을 검증하고 `UpdaterConfig`를 생성합니다.
    pub fn build(self) -> Result<UpdaterConfig, UpdaterError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
