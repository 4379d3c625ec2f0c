//! 정책 기반 컨테이너 업데이트
//!
//! 호스트의 모든 컨테이너를 주기적으로 조회하고, include/exclude 정책에 따라
//! 선택된 컨테이너를 최신 이미지로 다시 만듭니다. 원래의 런타임 명세
//! (명령, 환경변수, 마운트, 네트워크, 재시작 정책)는 그대로 유지됩니다.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`UpdaterError`, `RecreateError`, `PipelineStep`)
//! - [`config`]: Updater configuration (`UpdaterConfig`, builder)
//! - [`docker`]: Docker API abstraction (`DockerClient` trait, `BollardDockerClient`)
//! - [`policy`]: Include/exclude policy (`PolicyConfig`, `PolicyStore`)
//! - [`selector`]: Update decision (`should_update`, `Decision`)
//! - [`recreate`]: Recreate pipeline (`Recreator`, `RecreateOutcome`)
//! - [`scheduler`]: Poll loop (`Scheduler`, `CycleReport`)
//! - [`reload`]: Policy hot reload (`ReloadWatcher`)
//! - [`updater`]: Task lifecycle (`Updater`, `UpdaterBuilder`)
//!
//! # Architecture
//!
//! ```text
//! SIGHUP --mpsc--> ReloadWatcher --load--> PolicyStore
//!                                              |
//!                                          snapshot()
//!                                              |
//! Scheduler --list--> should_update() --> Recreator --> DockerClient
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod policy;
pub mod recreate;
pub mod reload;
pub mod scheduler;
pub mod selector;
pub mod updater;

// --- Public API Re-exports ---

// Updater (task lifecycle)
pub use updater::{Updater, UpdaterBuilder};

// Configuration
pub use config::{UpdaterConfig, UpdaterConfigBuilder};

// Error
pub use error::{PipelineStep, RecreateError, UpdaterError};

// Docker API
pub use docker::{BollardDockerClient, DockerClient, split_image_reference};

// Policy
pub use policy::{PolicyConfig, PolicyFormat, PolicyLoaded, PolicyStore, load_policy_from_file};

// Selector
pub use selector::{Decision, evaluate, should_update};

// Recreate
pub use recreate::{RecreateOutcome, Recreator, is_shadow_name, shadow_name};

// Scheduler
pub use scheduler::{ContainerResult, CycleReport, Scheduler};

// Reload
pub use reload::ReloadWatcher;
