//! 업데이터 오케스트레이터 -- 스케줄러와 리로드 감시자의 생명주기 관리
//!
//! [`Updater`]는 두 개의 장기 실행 태스크를 소유합니다.
//!
//! ```text
//! SIGHUP ──mpsc──> ReloadWatcher ──load()──> PolicyStore
//!                                                │ snapshot()
//!                                                ▼
//!                  Scheduler ──evaluate()──> Recreator ──> DockerClient
//!
//! shutdown ──broadcast──> Scheduler, ReloadWatcher
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::config::UpdaterConfig;
use crate::docker::DockerClient;
use crate::error::UpdaterError;
use crate::policy::PolicyStore;
use crate::reload::ReloadWatcher;
use crate::scheduler::{CycleReport, Scheduler};

/// 업데이터 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum UpdaterState {
    Initialized,
    Running,
    Stopped,
}

/// 컨테이너 자동 업데이터
///
/// # 사용 예시
/// ```ignore
/// use hikup_updater::{BollardDockerClient, UpdaterBuilder};
///
/// let docker = Arc::new(BollardDockerClient::connect_local()?);
/// let mut updater = UpdaterBuilder::new()
///     .config(config)
///     .docker_client(docker)
///     .build()?;
///
/// let reload = updater.reload_handle();  // SIGHUP 핸들러에 연결
/// updater.start().await?;
/// ```
pub struct Updater<D: DockerClient> {
    config: UpdaterConfig,
    state: UpdaterState,
    docker: Arc<D>,
    policy: Arc<PolicyStore>,
    scheduler: Arc<Scheduler<D>>,
    watcher: Arc<ReloadWatcher>,
    reload_tx: mpsc::Sender<()>,
    reload_rx: Option<mpsc::Receiver<()>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl<D: DockerClient> Updater<D> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            UpdaterState::Initialized => "initialized",
            UpdaterState::Running => "running",
            UpdaterState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn policy_store(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.policy)
    }

    /// 리로드 트리거 송신자를 반환합니다.
    pub fn reload_handle(&self) -> mpsc::Sender<()> {
        self.reload_tx.clone()
    }

    /// 주기를 한 번만 실행합니다 (`--once`).
    pub async fn run_once(&self) -> Result<CycleReport, UpdaterError> {
        self.scheduler.run_cycle().await
    }

    /// 스케줄러와 리로드 감시자를 시작합니다.
    pub async fn start(&mut self) -> Result<(), UpdaterError> {
        match self.state {
            UpdaterState::Running => return Err(UpdaterError::AlreadyRunning),
            UpdaterState::Stopped => return Err(UpdaterError::Stopped),
            UpdaterState::Initialized => {}
        }

        info!("starting updater");

        if let Err(e) = self.docker.ping().await {
            warn!(error = %e, "docker daemon not reachable, cycles will retry");
        }

        // taken exactly once, on the only transition out of Initialized
        let reload_rx = self.reload_rx.take().ok_or(UpdaterError::Stopped)?;

        let scheduler = Arc::clone(&self.scheduler);
        let scheduler_shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            scheduler.run(scheduler_shutdown).await;
        }));

        let watcher = Arc::clone(&self.watcher);
        let watcher_shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            watcher.run(reload_rx, watcher_shutdown).await;
        }));

        self.state = UpdaterState::Running;
        info!("updater started");
        Ok(())
    }

    /// 종료 신호를 보내고 태스크가 끝날 때까지 기다립니다.
    ///
    /// 진행 중인 재생성은 끝까지 실행됩니다.
    pub async fn stop(&mut self) -> Result<(), UpdaterError> {
        if self.state != UpdaterState::Running {
            return Err(UpdaterError::NotRunning);
        }

        info!("stopping updater");
        // receivers may already be gone if a task exited on its own
        let _ = self.shutdown_tx.send(());

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "updater task terminated abnormally");
            }
        }

        self.state = UpdaterState::Stopped;
        info!("updater stopped");
        Ok(())
    }
}

/// 업데이터 빌더
pub struct UpdaterBuilder<D: DockerClient> {
    config: UpdaterConfig,
    docker: Option<Arc<D>>,
    policy: Option<Arc<PolicyStore>>,
    reload_channel_capacity: usize,
}

impl<D: DockerClient> Default for UpdaterBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DockerClient> UpdaterBuilder<D> {
    pub fn new() -> Self {
        Self {
            config: UpdaterConfig::default(),
            docker: None,
            policy: None,
            reload_channel_capacity: 4,
        }
    }

    pub fn config(mut self, config: UpdaterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn docker_client(mut self, docker: Arc<D>) -> Self {
        self.docker = Some(docker);
        self
    }

    /// 이미 구성된 정책 저장소를 사용합니다.
    ///
    /// 설정하지 않으면 `policy_path`에서 초기 정책을 읽습니다.
    pub fn policy_store(mut self, store: Arc<PolicyStore>) -> Self {
        self.policy = Some(store);
        self
    }

    pub fn reload_channel_capacity(mut self, capacity: usize) -> Self {
        self.reload_channel_capacity = capacity;
        self
    }

    /// 업데이터를 빌드합니다.
    ///
    /// 초기 정책 로드 실패는 치명적이지 않으며, 빈 정책으로 시작합니다.
    pub fn build(self) -> Result<Updater<D>, UpdaterError> {
        self.config.validate()?;

        let docker = self.docker.ok_or_else(|| UpdaterError::Config {
            field: "docker_client".to_owned(),
            reason: "docker client must be provided".to_owned(),
        })?;

        if self.reload_channel_capacity == 0 {
            return Err(UpdaterError::Config {
                field: "reload_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let policy = match self.policy {
            Some(store) => store,
            None => Arc::new(initial_policy(&self.config)),
        };

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&docker),
            Arc::clone(&policy),
            &self.config,
        ));
        let watcher = Arc::new(ReloadWatcher::new(
            Arc::clone(&policy),
            self.config.policy_path.clone(),
        ));
        let (reload_tx, reload_rx) = mpsc::channel(self.reload_channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Updater {
            config: self.config,
            state: UpdaterState::Initialized,
            docker,
            policy,
            scheduler,
            watcher,
            reload_tx,
            reload_rx: Some(reload_rx),
            shutdown_tx,
            tasks: Vec::new(),
        })
    }
}

fn initial_policy(config: &UpdaterConfig) -> PolicyStore {
    let Some(path) = &config.policy_path else {
        if !config.force_all {
            warn!("no policy file configured, no container will be selected");
        }
        return PolicyStore::new();
    };
    match PolicyStore::from_file(path) {
        Ok(store) => {
            let policy = store.snapshot();
            info!(
                path = %path.display(),
                include = policy.include_containers.len(),
                exclude = policy.exclude_containers.len(),
                "policy loaded"
            );
            store
        }
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "failed to load initial policy, starting with an empty policy"
            );
            PolicyStore::new()
        }
    }
}
