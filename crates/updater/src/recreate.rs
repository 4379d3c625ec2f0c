//! 컨테이너 재생성 파이프라인
//!
//! [`Recreator`]는 컨테이너 하나를 최신 이미지로 다시 만듭니다.
//! 검사(inspect) 시점에 캡처한 [`ContainerSnapshot`]이 재구성의 유일한 입력입니다.
//!
//! # 전략
//!
//! **Replace** (엄격한 순서):
//! ```text
//! inspect -> pull -> stop -> remove -> create -> start
//! ```
//!
//! **Shadow** (기본값):
//! ```text
//! inspect -> pull -> stop -> rename(shadow) -> create -> start -> verify -> remove(shadow)
//!                                                 │          │
//!                                                 └── 실패 ──┴──▶ rollback
//!                                                     (새 컨테이너 삭제, shadow 이름 복구, 재시작)
//! ```
//!
//! rename이 실패하면 이름 변경 없이 원본만 재시작합니다. verify는 원본이
//! 실행 중이었을 때만 새 컨테이너의 실행 상태를 확인합니다.
//!
//! 어느 단계든 실패하면 이후 단계는 실행되지 않으며, 에러는 실패한 단계를 나타냅니다.
//! 런타임 호출마다 데드라인이 적용됩니다 (`operation_timeout`, pull은 `pull_timeout`).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hikup_core::config::RecreateStrategy;
use hikup_core::metrics as m;
use hikup_core::types::{ContainerSnapshot, short_id};
use tracing::{debug, error, info, warn};

use crate::config::UpdaterConfig;
use crate::docker::DockerClient;
use crate::error::{RecreateError, UpdaterError};

/// shadow 컨테이너 이름에 들어가는 표식
pub const SHADOW_MARKER: &str = "-hikup-old-";

/// 원본 컨테이너를 보관할 shadow 이름을 만듭니다.
pub fn shadow_name(name: &str, id: &str) -> String {
    format!("{name}{SHADOW_MARKER}{}", short_id(id))
}

/// 이 도구가 만든 shadow 컨테이너인지 확인합니다.
pub fn is_shadow_name(name: &str) -> bool {
    name.contains(SHADOW_MARKER)
}

/// 성공한 재생성의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecreateOutcome {
    pub name: String,
    pub image: String,
    pub old_id: String,
    pub new_id: String,
    pub strategy: RecreateStrategy,
    /// shadow 정리에 실패해 원본이 남아 있음
    pub shadow_left_behind: bool,
}

/// 컨테이너 재생성기
pub struct Recreator<D: DockerClient> {
    docker: Arc<D>,
    strategy: RecreateStrategy,
    stop_grace: Duration,
    operation_timeout: Duration,
    pull_timeout: Duration,
}

impl<D: DockerClient> Recreator<D> {
    pub fn new(docker: Arc<D>, config: &UpdaterConfig) -> Self {
        Self {
            docker,
            strategy: config.recreate_strategy,
            stop_grace: config.stop_grace(),
            operation_timeout: config.operation_timeout(),
            pull_timeout: config.pull_timeout(),
        }
    }

    pub fn strategy(&self) -> RecreateStrategy {
        self.strategy
    }

    /// 컨테이너를 최신 이미지로 재생성합니다.
    ///
    /// # Errors
    /// 실패한 단계에 해당하는 [`RecreateError`] 변형
    pub async fn recreate(&self, container_id: &str) -> Result<RecreateOutcome, RecreateError> {
        let started = Instant::now();
        let result = match self.strategy {
            RecreateStrategy::Replace => self.recreate_replace(container_id).await,
            RecreateStrategy::Shadow => self.recreate_shadow(container_id).await,
        };

        let strategy = self.strategy.to_string();
        match &result {
            Ok(outcome) => {
                metrics::counter!(
                    m::UPDATER_RECREATIONS_TOTAL,
                    m::LABEL_RESULT => "success",
                    m::LABEL_STRATEGY => strategy
                )
                .increment(1);
                metrics::histogram!(m::UPDATER_RECREATE_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                info!(
                    container = %outcome.name,
                    old_id = %short_id(&outcome.old_id),
                    new_id = %short_id(&outcome.new_id),
                    image = %outcome.image,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "container updated"
                );
            }
            Err(e) => {
                metrics::counter!(
                    m::UPDATER_RECREATIONS_TOTAL,
                    m::LABEL_RESULT => "failure",
                    m::LABEL_STRATEGY => strategy
                )
                .increment(1);
                metrics::counter!(m::UPDATER_STEP_FAILURES_TOTAL, m::LABEL_STEP => e.step().as_str())
                    .increment(1);
                error!(
                    container = %e.container(),
                    step = %e.step(),
                    rolled_back = e.rolled_back(),
                    error = %e,
                    "container update failed"
                );
            }
        }
        result
    }

    /// 런타임 호출에 데드라인을 적용합니다.
    async fn call<T>(
        &self,
        operation: &'static str,
        deadline: Duration,
        fut: impl Future<Output = Result<T, UpdaterError>>,
    ) -> Result<T, UpdaterError> {
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpdaterError::Timeout {
                operation,
                secs: deadline.as_secs(),
            }),
        }
    }

    /// 공통 단계: inspect -> pull -> stop
    async fn prepare(&self, container_id: &str) -> Result<ContainerSnapshot, RecreateError> {
        let snapshot = self
            .call(
                "inspect",
                self.operation_timeout,
                self.docker.inspect_container(container_id),
            )
            .await
            .map_err(|e| RecreateError::InspectFailed {
                container: short_id(container_id).to_owned(),
                reason: e.to_string(),
            })?;
        debug!(container = %snapshot, "captured container snapshot");

        let name = snapshot.name.clone();
        let image = snapshot.image().to_owned();
        if image.is_empty() {
            return Err(RecreateError::PullFailed {
                container: name,
                image,
                reason: "container has no image reference".to_owned(),
            });
        }

        self.call("pull", self.pull_timeout, self.docker.pull_image(&image))
            .await
            .map_err(|e| RecreateError::PullFailed {
                container: name.clone(),
                image: image.clone(),
                reason: e.to_string(),
            })?;
        info!(container = %name, image = %image, "pulled latest image");

        self.call(
            "stop",
            self.operation_timeout,
            self.docker.stop_container(&snapshot.id, self.stop_grace),
        )
        .await
        .map_err(|e| RecreateError::StopFailed {
            container: name.clone(),
            reason: e.to_string(),
        })?;
        debug!(container = %name, was_running = snapshot.running, "container stopped");

        Ok(snapshot)
    }

    async fn recreate_replace(&self, container_id: &str) -> Result<RecreateOutcome, RecreateError> {
        let snapshot = self.prepare(container_id).await?;
        let name = snapshot.name.clone();

        self.call(
            "remove",
            self.operation_timeout,
            self.docker.remove_container(&snapshot.id),
        )
        .await
        .map_err(|e| RecreateError::RemoveFailed {
            container: name.clone(),
            reason: e.to_string(),
        })?;
        debug!(container = %name, "old container removed");

        let new_id = self
            .call(
                "create",
                self.operation_timeout,
                self.docker.create_container(&name, &snapshot),
            )
            .await
            .map_err(|e| RecreateError::CreateFailed {
                container: name.clone(),
                reason: e.to_string(),
                rolled_back: false,
            })?;
        debug!(container = %name, new_id = %short_id(&new_id), "new container created");

        self.call(
            "start",
            self.operation_timeout,
            self.docker.start_container(&new_id),
        )
        .await
        .map_err(|e| RecreateError::StartFailed {
            container: name.clone(),
            new_id: new_id.clone(),
            reason: e.to_string(),
            rolled_back: false,
        })?;

        Ok(RecreateOutcome {
            image: snapshot.image().to_owned(),
            old_id: snapshot.id,
            new_id,
            name,
            strategy: RecreateStrategy::Replace,
            shadow_left_behind: false,
        })
    }

    async fn recreate_shadow(&self, container_id: &str) -> Result<RecreateOutcome, RecreateError> {
        let snapshot = self.prepare(container_id).await?;
        let name = snapshot.name.clone();
        let shadow = shadow_name(&name, &snapshot.id);

        if let Err(e) = self
            .call(
                "rename",
                self.operation_timeout,
                self.docker.rename_container(&snapshot.id, &shadow),
            )
            .await
        {
            let rolled_back = self.restore(&snapshot, false).await;
            return Err(RecreateError::RenameFailed {
                container: name,
                reason: e.to_string(),
                rolled_back,
            });
        }
        debug!(container = %name, shadow = %shadow, "original renamed to shadow");

        let new_id = match self
            .call(
                "create",
                self.operation_timeout,
                self.docker.create_container(&name, &snapshot),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let rolled_back = self.restore(&snapshot, true).await;
                return Err(RecreateError::CreateFailed {
                    container: name,
                    reason: e.to_string(),
                    rolled_back,
                });
            }
        };
        debug!(container = %name, new_id = %short_id(&new_id), "new container created");

        if let Err(reason) = self.start_and_verify(&new_id, snapshot.running).await {
            let rolled_back =
                self.discard_new(&name, &new_id).await && self.restore(&snapshot, true).await;
            return Err(RecreateError::StartFailed {
                container: name,
                new_id,
                reason,
                rolled_back,
            });
        }

        let shadow_left_behind = match self
            .call(
                "remove",
                self.operation_timeout,
                self.docker.remove_container(&snapshot.id),
            )
            .await
        {
            Ok(()) => false,
            Err(e) => {
                warn!(
                    container = %name,
                    shadow = %shadow,
                    error = %e,
                    "failed to remove shadow container, leaving it behind"
                );
                true
            }
        };

        Ok(RecreateOutcome {
            image: snapshot.image().to_owned(),
            old_id: snapshot.id,
            new_id,
            name,
            strategy: RecreateStrategy::Shadow,
            shadow_left_behind,
        })
    }

    /// 새 컨테이너를 시작하고 실행 중인지 확인합니다.
    ///
    /// 원본이 정지 상태였다면 시작 성공만 확인합니다. 일회성 작업 컨테이너는
    /// 시작 직후 종료될 수 있습니다.
    async fn start_and_verify(&self, new_id: &str, expect_running: bool) -> Result<(), String> {
        self.call(
            "start",
            self.operation_timeout,
            self.docker.start_container(new_id),
        )
        .await
        .map_err(|e| e.to_string())?;
        if !expect_running {
            return Ok(());
        }

        let inspected = self
            .call(
                "inspect",
                self.operation_timeout,
                self.docker.inspect_container(new_id),
            )
            .await
            .map_err(|e| format!("verification failed: {e}"))?;
        if !inspected.running {
            return Err("container is not running after start".to_owned());
        }
        Ok(())
    }

    /// 실패한 새 컨테이너를 강제 삭제합니다.
    async fn discard_new(&self, name: &str, new_id: &str) -> bool {
        match self
            .call(
                "remove",
                self.operation_timeout,
                self.docker.remove_container(new_id),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    container = %name,
                    new_id = %short_id(new_id),
                    error = %e,
                    "failed to remove new container, original stays under its shadow name"
                );
                false
            }
        }
    }

    /// shadow 이름을 원래대로 되돌리고, 실행 중이었다면 다시 시작합니다.
    ///
    /// `renamed`가 false이면 이름 변경 전에 실패한 경우로, 재시작만 합니다.
    async fn restore(&self, snapshot: &ContainerSnapshot, renamed: bool) -> bool {
        let restored = self.try_restore(snapshot, renamed).await;
        match &restored {
            Ok(()) => {
                metrics::counter!(m::UPDATER_ROLLBACKS_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                warn!(container = %snapshot.name, "rolled back to original container");
            }
            Err(e) => {
                metrics::counter!(m::UPDATER_ROLLBACKS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                error!(
                    container = %snapshot.name,
                    shadow = %shadow_name(&snapshot.name, &snapshot.id),
                    error = %e,
                    "rollback failed, manual intervention required"
                );
            }
        }
        restored.is_ok()
    }

    async fn try_restore(
        &self,
        snapshot: &ContainerSnapshot,
        renamed: bool,
    ) -> Result<(), UpdaterError> {
        if renamed {
            self.call(
                "rename",
                self.operation_timeout,
                self.docker.rename_container(&snapshot.id, &snapshot.name),
            )
            .await?;
        }
        if snapshot.running {
            self.call(
                "start",
                self.operation_timeout,
                self.docker.start_container(&snapshot.id),
            )
            .await?;
        }
        Ok(())
    }
}
