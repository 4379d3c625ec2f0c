//! 업데이터 에러 타입
//!
//! [`UpdaterError`]는 Docker API 호출, 목록 조회, 설정 에러를 표현하고,
//! [`RecreateError`]는 재생성 파이프라인의 어느 단계에서 실패했는지를 표현합니다.
//! `From<UpdaterError> for HikupError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use std::fmt;

use hikup_core::error::{ConfigError, HikupError};

/// 업데이터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 연결 실패 (시작 시점에는 치명적)
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 컨테이너 목록 조회 실패 (해당 주기는 건너뜀)
    #[error("list containers failed: {0}")]
    ListFailed(String),

    /// 런타임 호출 데드라인 초과
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// 호출한 런타임 연산
        operation: &'static str,
        /// 적용된 데드라인 (초)
        secs: u64,
    },

    /// 이미 실행 중인 업데이터를 다시 시작함
    #[error("updater is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 업데이터를 정지함
    #[error("updater is not running")]
    NotRunning,

    /// 정지된 업데이터를 다시 시작함 (새로 빌드해야 함)
    #[error("updater has been stopped and cannot be restarted")]
    Stopped,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<UpdaterError> for HikupError {
    fn from(err: UpdaterError) -> Self {
        match err {
            UpdaterError::Config { field, reason } => {
                HikupError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => HikupError::Runtime(other.to_string()),
        }
    }
}

/// 재생성 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Inspect,
    Pull,
    Stop,
    /// 원본 컨테이너 이름 변경 (shadow 전략)
    Rename,
    Remove,
    Create,
    Start,
}

impl PipelineStep {
    /// 메트릭 레이블/로그 필드용 고정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Pull => "pull",
            Self::Stop => "stop",
            Self::Rename => "rename",
            Self::Remove => "remove",
            Self::Create => "create",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 재생성 파이프라인 에러
///
/// 각 변형은 실패한 단계를 나타내며, 그 이후 단계는 실행되지 않습니다.
/// `rolled_back`은 shadow 전략에서 원본 컨테이너가 복구되었는지 여부입니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecreateError {
    /// 검사 실패 -- 아무것도 변경되지 않음
    #[error("inspect failed for container '{container}': {reason}")]
    InspectFailed { container: String, reason: String },

    /// 이미지 pull 실패 -- 원본 컨테이너는 그대로 실행 중
    #[error("pull of '{image}' failed for container '{container}': {reason}")]
    PullFailed {
        container: String,
        image: String,
        reason: String,
    },

    /// 정지 실패 -- 원본이 정지 중 상태일 수 있음
    #[error("stop failed for container '{container}': {reason}")]
    StopFailed { container: String, reason: String },

    /// 원본 이름 변경 실패 -- 원본은 원래 이름으로 재시작됨
    #[error("rename failed for container '{container}' (rolled back: {rolled_back}): {reason}")]
    RenameFailed {
        container: String,
        reason: String,
        rolled_back: bool,
    },

    /// 삭제 실패 -- 원본은 정지된 채 남아 있음
    #[error("remove failed for container '{container}': {reason}")]
    RemoveFailed { container: String, reason: String },

    /// 생성 실패
    #[error("create failed for container '{container}' (rolled back: {rolled_back}): {reason}")]
    CreateFailed {
        container: String,
        reason: String,
        rolled_back: bool,
    },

    /// 시작 실패 또는 시작 후 실행 중이 아님
    #[error(
        "start failed for container '{container}' (new id {new_id}, rolled back: {rolled_back}): {reason}"
    )]
    StartFailed {
        container: String,
        new_id: String,
        reason: String,
        rolled_back: bool,
    },
}

impl RecreateError {
    /// 실패한 파이프라인 단계를 반환합니다.
    pub fn step(&self) -> PipelineStep {
        match self {
            Self::InspectFailed { .. } => PipelineStep::Inspect,
            Self::PullFailed { .. } => PipelineStep::Pull,
            Self::StopFailed { .. } => PipelineStep::Stop,
            Self::RenameFailed { .. } => PipelineStep::Rename,
            Self::RemoveFailed { .. } => PipelineStep::Remove,
            Self::CreateFailed { .. } => PipelineStep::Create,
            Self::StartFailed { .. } => PipelineStep::Start,
        }
    }

    /// 대상 컨테이너 (이름 또는 ID)
    pub fn container(&self) -> &str {
        match self {
            Self::InspectFailed { container, .. }
            | Self::PullFailed { container, .. }
            | Self::StopFailed { container, .. }
            | Self::RenameFailed { container, .. }
            | Self::RemoveFailed { container, .. }
            | Self::CreateFailed { container, .. }
            | Self::StartFailed { container, .. } => container,
        }
    }

    /// 원본 컨테이너가 복구되었는지 여부
    pub fn rolled_back(&self) -> bool {
        match self {
            Self::RenameFailed { rolled_back, .. }
            | Self::CreateFailed { rolled_back, .. }
            | Self::StartFailed { rolled_back, .. } => *rolled_back,
            _ => false,
        }
    }
}
