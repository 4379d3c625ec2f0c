//! 통합 테스트 -- 전체 업데이트 플로우 검증
//!
//! 정책 파일 로드 → 컨테이너 선택 → 재생성 → 리로드
//! 시나리오를 공개 API와 메모리 기반 Docker 클라이언트로 테스트합니다.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use hikup_core::config::RecreateStrategy;
use hikup_core::types::{ContainerSnapshot, ContainerSpec, HostSpec, RestartPolicy};
use hikup_updater::{
    PipelineStep, PolicyConfig, PolicyStore, RecreateError, Recreator, ReloadWatcher, Scheduler,
    UpdaterBuilder, UpdaterConfigBuilder, should_update,
};
use tokio::sync::{broadcast, mpsc};

// Mock Docker client for integration tests
mod mock {
    use super::*;
    use hikup_core::types::ContainerSummary;
    use hikup_updater::{DockerClient, UpdaterError};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct State {
        containers: Vec<ContainerSnapshot>,
        calls: Vec<&'static str>,
        fail_on: Option<&'static str>,
        next_id: u64,
    }

    pub struct TestDockerClient {
        state: Mutex<State>,
    }

    impl TestDockerClient {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(State::default()),
            }
        }

        pub async fn add_container(&self, snapshot: ContainerSnapshot) {
            self.state.lock().await.containers.push(snapshot);
        }

        /// 해당 연산("pull", "stop", ...)이 항상 실패하도록 설정합니다.
        pub async fn fail_on(&self, op: &'static str) {
            self.state.lock().await.fail_on = Some(op);
        }

        pub async fn calls(&self) -> Vec<&'static str> {
            self.state.lock().await.calls.clone()
        }

        pub async fn find(&self, name: &str) -> Option<ContainerSnapshot> {
            self.state
                .lock()
                .await
                .containers
                .iter()
                .find(|c| c.name == name)
                .cloned()
        }

        pub async fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self
                .state
                .lock()
                .await
                .containers
                .iter()
                .map(|c| c.name.clone())
                .collect();
            names.sort();
            names
        }

        async fn record(&self, op: &'static str) -> Result<(), UpdaterError> {
            let mut state = self.state.lock().await;
            state.calls.push(op);
            if state.fail_on == Some(op) {
                return Err(UpdaterError::DockerApi(format!("injected {op} failure")));
            }
            Ok(())
        }

        async fn with_container<T>(
            &self,
            id: &str,
            f: impl FnOnce(&mut ContainerSnapshot) -> T,
        ) -> Result<T, UpdaterError> {
            let mut state = self.state.lock().await;
            state
                .containers
                .iter_mut()
                .find(|c| c.id == id)
                .map(f)
                .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))
        }
    }

    impl DockerClient for TestDockerClient {
        async fn list_containers(&self) -> Result<Vec<ContainerSummary>, UpdaterError> {
            self.record("list").await?;
            Ok(self
                .state
                .lock()
                .await
                .containers
                .iter()
                .map(|c| ContainerSummary {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    image: c.container.image.clone(),
                    state: if c.running { "running" } else { "exited" }.to_owned(),
                })
                .collect())
        }

        async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
            self.record("inspect").await?;
            self.with_container(id, |c| c.clone()).await
        }

        async fn pull_image(&self, _reference: &str) -> Result<(), UpdaterError> {
            self.record("pull").await
        }

        async fn stop_container(&self, id: &str, _grace: Duration) -> Result<(), UpdaterError> {
            self.record("stop").await?;
            self.with_container(id, |c| c.running = false).await
        }

        async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
            self.record("remove").await?;
            let mut state = self.state.lock().await;
            let before = state.containers.len();
            state.containers.retain(|c| c.id != id);
            if state.containers.len() == before {
                return Err(UpdaterError::ContainerNotFound(id.to_owned()));
            }
            Ok(())
        }

        async fn create_container(
            &self,
            name: &str,
            snapshot: &ContainerSnapshot,
        ) -> Result<String, UpdaterError> {
            self.record("create").await?;
            let mut state = self.state.lock().await;
            if state.containers.iter().any(|c| c.name == name) {
                return Err(UpdaterError::DockerApi(format!("name {name} in use")));
            }
            state.next_id += 1;
            let id = format!("{:064x}", 0xfeed_0000_u64 + state.next_id);
            state.containers.push(ContainerSnapshot {
                id: id.clone(),
                name: name.to_owned(),
                running: false,
                ..snapshot.clone()
            });
            Ok(id)
        }

        async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
            self.record("start").await?;
            self.with_container(id, |c| c.running = true).await
        }

        async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
            self.record("rename").await?;
            let new_name = new_name.to_owned();
            self.with_container(id, move |c| c.name = new_name).await
        }

        async fn ping(&self) -> Result<(), UpdaterError> {
            self.record("ping").await
        }
    }
}

use mock::TestDockerClient;

fn snapshot(n: u8, name: &str) -> ContainerSnapshot {
    ContainerSnapshot {
        id: format!("{n:064x}"),
        name: name.to_owned(),
        running: true,
        container: ContainerSpec {
            image: format!("registry.local:5000/{name}:stable"),
            cmd: Some(vec!["serve".to_owned()]),
            env: Some(vec![format!("SERVICE={name}")]),
            ..Default::default()
        },
        host: HostSpec {
            binds: Some(vec![format!("/srv/{name}:/data")]),
            restart_policy: Some(RestartPolicy {
                name: "always".to_owned(),
                maximum_retry_count: None,
            }),
            ..Default::default()
        },
        networks: BTreeMap::new(),
    }
}

async fn three_services() -> Arc<TestDockerClient> {
    let client = Arc::new(TestDockerClient::new());
    client.add_container(snapshot(1, "web")).await;
    client.add_container(snapshot(2, "cache")).await;
    client.add_container(snapshot(3, "db")).await;
    client
}

fn policy(include: &[&str], exclude: &[&str]) -> PolicyConfig {
    PolicyConfig::new(
        include.iter().map(|s| s.to_string()).collect(),
        exclude.iter().map(|s| s.to_string()).collect(),
    )
}

fn write_policy(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

async fn updated_names(client: &TestDockerClient, names: &[&str]) -> Vec<String> {
    let mut updated = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let original = format!("{:064x}", i + 1);
        if let Some(c) = client.find(name).await {
            if c.id != original {
                updated.push((*name).to_owned());
            }
        }
    }
    updated
}

#[tokio::test]
async fn wildcard_with_exclude_updates_all_but_excluded() {
    let client = three_services().await;
    let store = Arc::new(PolicyStore::with_policy(policy(&["*"], &["cache"])));
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), store, &config);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.listed, 3);
    assert_eq!(report.selected, 2);
    assert_eq!(report.updated(), 2);
    assert_eq!(
        updated_names(&client, &["web", "cache", "db"]).await,
        vec!["web", "db"]
    );
    // shadow 컨테이너는 정리됨
    assert_eq!(client.names().await, vec!["cache", "db", "web"]);
}

#[tokio::test]
async fn exact_include_updates_only_listed_container() {
    let client = three_services().await;
    let store = Arc::new(PolicyStore::with_policy(policy(&["web"], &[])));
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), store, &config);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.selected, 1);
    assert_eq!(updated_names(&client, &["web", "cache", "db"]).await, vec!["web"]);
}

#[tokio::test]
async fn empty_policy_touches_nothing() {
    let client = three_services().await;
    let store = Arc::new(PolicyStore::new());
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), store, &config);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.selected, 0);
    assert_eq!(client.calls().await, vec!["list"]);
}

#[tokio::test]
async fn force_all_ignores_policy() {
    let client = three_services().await;
    let store = Arc::new(PolicyStore::with_policy(policy(&[], &["web", "cache", "db"])));
    let config = UpdaterConfigBuilder::new().force_all(true).build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), store, &config);

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.updated(), 3);
}

#[tokio::test]
async fn recreated_container_keeps_runtime_spec() {
    let client = three_services().await;
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let recreator = Recreator::new(Arc::clone(&client), &config);
    let before = snapshot(1, "web");

    let outcome = recreator.recreate(&before.id).await.unwrap();
    let after = client.find("web").await.unwrap();

    assert_eq!(outcome.new_id, after.id);
    assert!(after.running);
    assert_eq!(after.container, before.container);
    assert_eq!(after.host, before.host);
    assert_eq!(after.networks, before.networks);
}

#[tokio::test]
async fn replace_failure_stops_later_steps() {
    let sequence = ["inspect", "pull", "stop", "remove", "create", "start"];
    let steps = [
        PipelineStep::Inspect,
        PipelineStep::Pull,
        PipelineStep::Stop,
        PipelineStep::Remove,
        PipelineStep::Create,
        PipelineStep::Start,
    ];

    for (k, (op, step)) in sequence.iter().zip(steps).enumerate() {
        let client = three_services().await;
        client.fail_on(op).await;
        let config = UpdaterConfigBuilder::new()
            .recreate_strategy(RecreateStrategy::Replace)
            .build()
            .unwrap();
        let recreator = Recreator::new(Arc::clone(&client), &config);

        let err = recreator
            .recreate(&snapshot(1, "web").id)
            .await
            .unwrap_err();

        assert_eq!(err.step(), step, "failing op {op}");
        assert_eq!(client.calls().await, sequence[..=k].to_vec(), "failing op {op}");
    }
}

#[tokio::test]
async fn shadow_create_failure_restores_original() {
    let client = three_services().await;
    client.fail_on("create").await;
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let recreator = Recreator::new(Arc::clone(&client), &config);
    let original = snapshot(1, "web");

    let err = recreator.recreate(&original.id).await.unwrap_err();

    assert!(matches!(
        err,
        RecreateError::CreateFailed {
            rolled_back: true,
            ..
        }
    ));
    let restored = client.find("web").await.unwrap();
    assert_eq!(restored.id, original.id);
    assert!(restored.running);
}

#[tokio::test]
async fn pull_failures_are_reported_per_container() {
    let client = three_services().await;
    let store = Arc::new(PolicyStore::with_policy(policy(&["*"], &[])));
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), Arc::clone(&store), &config);

    client.fail_on("pull").await;
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.selected, 3);
    assert_eq!(report.failed(), 3);
    assert!(report.results.iter().all(|r| matches!(
        r.result,
        Err(RecreateError::PullFailed { .. })
    )));
    // pull 실패 시 원본은 건드리지 않음
    assert_eq!(updated_names(&client, &["web", "cache", "db"]).await, Vec::<String>::new());
    assert!(client.find("web").await.unwrap().running);
}

#[tokio::test]
async fn policy_file_reload_changes_next_cycle() {
    let file = write_policy(".yaml", "include_containers: []\n");
    let store = Arc::new(PolicyStore::from_file(file.path()).unwrap());
    let client = three_services().await;
    let config = UpdaterConfigBuilder::new().build().unwrap();
    let scheduler = Scheduler::new(Arc::clone(&client), Arc::clone(&store), &config);
    let watcher = ReloadWatcher::new(Arc::clone(&store), Some(file.path().to_path_buf()));

    assert_eq!(scheduler.run_cycle().await.unwrap().selected, 0);

    std::fs::write(
        file.path(),
        "include_containers:\n  - \"*\"\nexclude_containers:\n  - db\n",
    )
    .unwrap();
    assert!(watcher.reload().await);

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.selected, 2);
    assert!(!should_update("db", false, &store.snapshot()));
}

#[tokio::test]
async fn malformed_reload_keeps_previous_policy() {
    let file = write_policy(".json", r#"{"include_containers":["web"]}"#);
    let store = Arc::new(PolicyStore::from_file(file.path()).unwrap());
    let (trigger_tx, trigger_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let watcher = ReloadWatcher::new(Arc::clone(&store), Some(file.path().to_path_buf()));
    let handle = tokio::spawn(async move { watcher.run(trigger_rx, shutdown_rx).await });

    std::fs::write(file.path(), "{ not json").unwrap();
    trigger_tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(store.snapshot().is_included("web"));
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn updater_lifecycle_runs_initial_cycle() {
    let file = write_policy(".json", r#"{"include_containers":["db"]}"#);
    let client = three_services().await;
    let config = UpdaterConfigBuilder::new()
        .policy_path(file.path())
        .build()
        .unwrap();
    let mut updater = UpdaterBuilder::new()
        .config(config)
        .docker_client(Arc::clone(&client))
        .build()
        .unwrap();

    updater.start().await.unwrap();
    for _ in 0..100 {
        if client.calls().await.contains(&"remove") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    updater.stop().await.unwrap();

    assert_eq!(updated_names(&client, &["web", "cache", "db"]).await, vec!["db"]);
}
