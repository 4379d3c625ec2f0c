//! hikup 공통 크레이트
//!
//! 업데이터와 데몬이 공유하는 타입, 에러, 설정, 메트릭 이름을 정의합니다.
//!
//! - [`error`]: 최상위 에러 (`HikupError`, `ConfigError`)
//! - [`types`]: 컨테이너 요약/스냅샷 도메인 타입
//! - [`config`]: `hikup.toml` 데몬 설정
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HikupError};

// 설정
pub use config::{
    DockerConfig, GeneralConfig, HikupConfig, MetricsConfig, RecreateStrategy, UpdaterSettings,
};

// 도메인 타입
pub use types::{
    ContainerSnapshot, ContainerSpec, ContainerSummary, EndpointSpec, HostSpec, IpamSpec,
    PortBinding, RestartPolicy,
};
