//! 폴링 스케줄러
//!
//! [`Scheduler`]는 고정 주기로 모든 컨테이너(정지된 것 포함)를 조회하고,
//! 컨테이너마다 현재 정책 스냅샷으로 선택 여부를 판단한 뒤
//! 선택된 컨테이너를 [`Recreator`]로 재생성합니다.
//!
//! - 목록 조회 실패 시 해당 주기를 건너뛰고 짧은 backoff 후 재시도합니다.
//! - 컨테이너 하나의 실패는 기록만 하고 다음 컨테이너로 진행합니다.
//! - 이 도구가 만든 shadow 컨테이너는 선택하지 않습니다.
//! - 종료 신호는 컨테이너 사이와 대기 중에 확인하며, 진행 중인 파이프라인은 끝까지 실행합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use hikup_core::metrics as m;

use crate::config::UpdaterConfig;
use crate::docker::DockerClient;
use crate::error::{RecreateError, UpdaterError};
use crate::policy::PolicyStore;
use crate::recreate::{RecreateOutcome, Recreator, is_shadow_name};
use crate::selector::evaluate;

/// 컨테이너 하나의 처리 결과
#[derive(Debug, Clone)]
pub struct ContainerResult {
    pub id: String,
    pub name: String,
    pub result: Result<RecreateOutcome, RecreateError>,
}

/// 한 주기의 요약
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 조회된 컨테이너 수
    pub listed: usize,
    /// 정책에 의해 선택된 컨테이너 수
    pub selected: usize,
    /// 건너뛴 shadow 컨테이너 수
    pub skipped_shadows: usize,
    pub results: Vec<ContainerResult>,
    /// 주기 도중 종료 신호를 받음
    pub interrupted: bool,
}

impl CycleReport {
    pub fn updated(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_err()).count()
    }
}

/// 폴링 스케줄러
pub struct Scheduler<D: DockerClient> {
    docker: Arc<D>,
    recreator: Recreator<D>,
    policy: Arc<PolicyStore>,
    force_all: bool,
    poll_interval: Duration,
    list_retry_backoff: Duration,
    list_timeout: Duration,
    max_concurrent: usize,
}

impl<D: DockerClient> Scheduler<D> {
    pub fn new(docker: Arc<D>, policy: Arc<PolicyStore>, config: &UpdaterConfig) -> Self {
        Self {
            recreator: Recreator::new(Arc::clone(&docker), config),
            docker,
            policy,
            force_all: config.force_all,
            poll_interval: config.poll_interval(),
            list_retry_backoff: config.list_retry_backoff(),
            list_timeout: config.operation_timeout(),
            max_concurrent: config.max_concurrent_recreations.max(1),
        }
    }

    pub fn policy_store(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// 주기를 한 번 실행합니다.
    ///
    /// # Errors
    /// 목록 조회 실패 시 `UpdaterError::ListFailed` (또는 `Timeout`)
    pub async fn run_cycle(&self) -> Result<CycleReport, UpdaterError> {
        self.cycle(None).await
    }

    /// 종료 신호를 받을 때까지 주기를 반복합니다.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            force_all = self.force_all,
            strategy = %self.recreator.strategy(),
            max_concurrent = self.max_concurrent,
            "scheduler started"
        );

        loop {
            let wait = match self.cycle(Some(&mut shutdown)).await {
                Ok(report) if report.interrupted => {
                    info!(
                        remaining = report.selected - report.results.len(),
                        "shutdown requested during cycle, scheduler stopping"
                    );
                    return;
                }
                Ok(_) => self.poll_interval,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.list_retry_backoff.as_secs(),
                        "failed to list containers, skipping cycle"
                    );
                    self.list_retry_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    info!("scheduler stopping");
                    return;
                }
            }
        }
    }

    async fn cycle(
        &self,
        shutdown: Option<&mut broadcast::Receiver<()>>,
    ) -> Result<CycleReport, UpdaterError> {
        let started = Instant::now();

        let containers = match tokio::time::timeout(self.list_timeout, self.docker.list_containers())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(UpdaterError::Timeout {
                operation: "list",
                secs: self.list_timeout.as_secs(),
            }),
        }
        .inspect_err(|_| {
            metrics::counter!(m::UPDATER_LIST_FAILURES_TOTAL).increment(1);
        })?;

        let mut report = CycleReport {
            listed: containers.len(),
            ..Default::default()
        };
        metrics::gauge!(m::UPDATER_CONTAINERS_LISTED).set(containers.len() as f64);

        let mut selected = Vec::new();
        for container in containers {
            if is_shadow_name(&container.name) {
                report.skipped_shadows += 1;
                debug!(container = %container.name, "skipping shadow container");
                continue;
            }
            let decision = evaluate(&container.name, self.force_all, &self.policy.snapshot());
            debug!(container = %container.name, decision = %decision, "policy decision");
            if decision.should_update() {
                selected.push((container.id, container.name));
            }
        }
        report.selected = selected.len();
        metrics::counter!(m::UPDATER_CONTAINERS_SELECTED_TOTAL).increment(selected.len() as u64);

        // 종료 신호가 오면 새 컨테이너를 시작하지 않음 (진행 중인 재생성은 계속)
        let stopped = AtomicBool::new(false);
        let stop = async {
            match shutdown {
                Some(rx) => {
                    let _ = rx.recv().await;
                    stopped.store(true, Ordering::Relaxed);
                }
                None => std::future::pending::<()>().await,
            }
        };

        report.results = futures_util::stream::iter(selected)
            .take_until(stop)
            .map(|(id, name)| async move {
                info!(container = %name, "updating container");
                let result = self.recreator.recreate(&id).await;
                ContainerResult { id, name, result }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        report.interrupted = stopped.load(Ordering::Relaxed);

        metrics::counter!(m::UPDATER_CYCLES_TOTAL).increment(1);
        info!(
            listed = report.listed,
            selected = report.selected,
            updated = report.updated(),
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "poll cycle completed"
        );
        Ok(report)
    }
}
