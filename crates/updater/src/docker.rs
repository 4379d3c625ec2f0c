//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait covers exactly the runtime calls the updater
//! needs: list, inspect, pull, stop, remove, create, start, rename and ping.
//! Production code uses [`BollardDockerClient`]; tests use `MockDockerClient`,
//! which records every call and can inject a failure into any operation.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐
//! │ Scheduler │──▶│ Recreator │
//! └─────┬─────┘   └─────┬─────┘
//!       │               │
//!       ▼               ▼
//!     ┌───────────────────┐
//!     │   DockerClient    │ (trait)
//!     └───────────────────┘
//!          │         │
//!          ▼         ▼
//!     ┌────────┐ ┌──────┐
//!     │Bollard │ │ Mock │
//!     └───┬────┘ └──────┘
//!         │
//!         ▼
//!   Docker Daemon
//! ```
//!
//! # Input Validation
//!
//! Container IDs must be 1-64 ASCII hex digits. Container names passed to
//! create/rename must match the runtime's `[a-zA-Z0-9][a-zA-Z0-9_.-]*` rule.
//! Invalid input is rejected with `UpdaterError::DockerApi` before any API call.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hikup_core::types::{
    ContainerSnapshot, ContainerSpec, ContainerSummary, EndpointSpec, HostSpec, IpamSpec,
    PortBinding, RestartPolicy, strip_name_prefix,
};

use crate::error::UpdaterError;

/// Tag used when an image reference carries neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

const MAX_NAME_LEN: usize = 255;

/// Validates a container ID to prevent injection attacks.
fn validate_container_id(id: &str) -> Result<(), UpdaterError> {
    if id.is_empty() || id.len() > 64 {
        return Err(UpdaterError::DockerApi(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UpdaterError::DockerApi(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Validates a container name against the runtime's naming rule.
fn validate_container_name(name: &str) -> Result<(), UpdaterError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(UpdaterError::DockerApi(format!(
            "invalid container name: length {} (must be 1-{MAX_NAME_LEN})",
            name.len()
        )));
    }
    let starts_alnum = name.starts_with(|c: char| c.is_ascii_alphanumeric());
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !starts_alnum || !allowed {
        return Err(UpdaterError::DockerApi(format!(
            "invalid container name '{name}'"
        )));
    }
    Ok(())
}

/// Splits an image reference into the repository and tag the pull API expects.
///
/// A registry port (`host:5000/app`) is not mistaken for a tag. A digest
/// (`repo@sha256:...`) is passed through as the tag, with any tag before it
/// dropped from the repository.
pub fn split_image_reference(reference: &str) -> (&str, &str) {
    if let Some((repo, digest)) = reference.split_once('@') {
        return (split_tag(repo).0, digest);
    }
    let (repo, tag) = split_tag(reference);
    (repo, tag.unwrap_or(DEFAULT_TAG))
}

fn split_tag(reference: &str) -> (&str, Option<&str>) {
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let colon = name_start + i;
            (&reference[..colon], Some(&reference[colon + 1..]))
        }
        None => (reference, None),
    }
}

/// Trait abstracting the container-runtime operations used by the updater.
///
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async tasks.
/// Implementations do not apply deadlines themselves; callers wrap each call
/// in `tokio::time::timeout`.
///
/// # Error Handling
///
/// - **404 errors**: converted to `UpdaterError::ContainerNotFound`
/// - **Connection errors**: wrapped as `UpdaterError::DockerConnection`
/// - **Everything else**: wrapped as `UpdaterError::DockerApi`
pub trait DockerClient: Send + Sync + 'static {
    /// Lists all containers, including stopped ones.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::ListFailed` if the runtime cannot be queried.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>, UpdaterError>> + Send;

    /// Captures the full runtime specification of a container.
    ///
    /// # Errors
    ///
    /// - `UpdaterError::ContainerNotFound`: container does not exist (404)
    /// - `UpdaterError::DockerApi`: invalid ID or other API errors
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerSnapshot, UpdaterError>> + Send;

    /// Pulls an image reference, draining the progress stream to completion.
    fn pull_image(&self, reference: &str)
    -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Stops a container, killing it after `grace` if it has not exited.
    ///
    /// Stopping an already-stopped container succeeds.
    fn stop_container(
        &self,
        id: &str,
        grace: Duration,
    ) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Force-removes a container, keeping its named volumes and links.
    fn remove_container(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Creates a container named `name` from a snapshot and returns its ID.
    fn create_container(
        &self,
        name: &str,
        snapshot: &ContainerSnapshot,
    ) -> impl Future<Output = Result<String, UpdaterError>> + Send;

    /// Starts a created or stopped container.
    fn start_container(&self, id: &str) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Renames a container.
    fn rename_container(
        &self,
        id: &str,
        new_name: &str,
    ) -> impl Future<Output = Result<(), UpdaterError>> + Send;

    /// Checks Docker daemon connectivity.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the daemon is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), UpdaterError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
///
/// # Examples
///
/// ```ignore
/// use hikup_updater::BollardDockerClient;
///
/// // Connect using DOCKER_HOST or the platform default socket
/// let client = BollardDockerClient::connect_local()?;
///
/// // Or connect to a specific socket
/// let client = BollardDockerClient::connect_with_socket("/run/docker.sock", 120)?;
/// # Ok::<(), hikup_updater::UpdaterError>(())
/// ```
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using `DOCKER_HOST` or the platform default socket.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the client cannot be built.
    pub fn connect_local() -> Result<Self, UpdaterError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            UpdaterError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::DockerConnection` if the client cannot be built.
    pub fn connect_with_socket(
        socket_path: &str,
        timeout_secs: u64,
    ) -> Result<Self, UpdaterError> {
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            timeout_secs,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            UpdaterError::DockerConnection(format!(
                "failed to connect to docker at {socket_path}: {e}"
            ))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

fn status_code(err: &bollard::errors::Error) -> Option<u16> {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
            Some(*status_code)
        }
        _ => None,
    }
}

fn api_error(id: &str, action: &str, err: bollard::errors::Error) -> UpdaterError {
    if status_code(&err) == Some(404) {
        UpdaterError::ContainerNotFound(id.to_owned())
    } else {
        UpdaterError::DockerApi(format!("{action} failed: {e}", e = err))
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, UpdaterError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| UpdaterError::ListFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| strip_name_prefix(n).to_owned())
                .unwrap_or_default();
            result.push(ContainerSummary {
                id: container.id.unwrap_or_default(),
                name,
                image: container.image.unwrap_or_default(),
                state: container.state.unwrap_or_default(),
            });
        }

        Ok(result)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| api_error(id, "inspect container", e))?;

        Ok(snapshot_from_inspect(details))
    }

    async fn pull_image(&self, reference: &str) -> Result<(), UpdaterError> {
        use bollard::image::CreateImageOptions;
        use futures_util::TryStreamExt;

        let (from_image, tag) = split_image_reference(reference);
        let options = CreateImageOptions::<String> {
            from_image: from_image.to_owned(),
            tag: tag.to_owned(),
            ..Default::default()
        };

        let progress: Vec<_> = self
            .docker
            .create_image(Some(options), None, None)
            .try_collect()
            .await
            .map_err(|e| UpdaterError::DockerApi(format!("pull {reference} failed: {e}")))?;

        // the daemon reports some pull failures inside the stream
        if let Some(message) = progress.into_iter().find_map(|info| info.error) {
            return Err(UpdaterError::DockerApi(format!(
                "pull {reference} failed: {message}"
            )));
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::StopContainerOptions;

        let t = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        match self
            .docker
            .stop_container(id, Some(StopContainerOptions { t }))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) => Err(api_error(id, "stop container", e)),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::RemoveContainerOptions;

        let options = RemoveContainerOptions {
            v: false,
            force: true,
            link: false,
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| api_error(id, "remove container", e))
    }

    async fn create_container(
        &self,
        name: &str,
        snapshot: &ContainerSnapshot,
    ) -> Result<String, UpdaterError> {
        validate_container_name(name)?;

        use bollard::container::CreateContainerOptions;

        let options = CreateContainerOptions {
            name: name.to_owned(),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), create_config_from_snapshot(snapshot))
            .await
            .map_err(|e| UpdaterError::DockerApi(format!("create container {name} failed: {e}")))?;

        for warning in &response.warnings {
            tracing::warn!(container = %name, warning = %warning, "runtime warning on create");
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;

        use bollard::container::StartContainerOptions;

        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| api_error(id, "start container", e))
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
        validate_container_id(id)?;
        validate_container_name(new_name)?;

        use bollard::container::RenameContainerOptions;

        self.docker
            .rename_container(
                id,
                RenameContainerOptions {
                    name: new_name.to_owned(),
                },
            )
            .await
            .map_err(|e| api_error(id, "rename container", e))
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        self.docker
            .ping()
            .await
            .map_err(|e| UpdaterError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

// --- bollard <-> snapshot conversion ---

fn restart_policy_name(name: bollard::models::RestartPolicyNameEnum) -> &'static str {
    use bollard::models::RestartPolicyNameEnum as Name;
    match name {
        Name::EMPTY => "",
        Name::NO => "no",
        Name::ALWAYS => "always",
        Name::UNLESS_STOPPED => "unless-stopped",
        Name::ON_FAILURE => "on-failure",
    }
}

fn restart_policy_enum(name: &str) -> Option<bollard::models::RestartPolicyNameEnum> {
    use bollard::models::RestartPolicyNameEnum as Name;
    match name {
        "" => Some(Name::EMPTY),
        "no" => Some(Name::NO),
        "always" => Some(Name::ALWAYS),
        "unless-stopped" => Some(Name::UNLESS_STOPPED),
        "on-failure" => Some(Name::ON_FAILURE),
        _ => None,
    }
}

fn key_set(map: Option<HashMap<String, HashMap<(), ()>>>) -> Option<Vec<String>> {
    map.map(|m| {
        let mut keys: Vec<String> = m.into_keys().collect();
        keys.sort_unstable();
        keys
    })
}

fn key_map(keys: &Option<Vec<String>>) -> Option<HashMap<String, HashMap<(), ()>>> {
    keys.as_ref()
        .map(|k| k.iter().map(|key| (key.clone(), HashMap::new())).collect())
}

/// Converts an inspect response into a runtime-independent snapshot.
pub(crate) fn snapshot_from_inspect(
    details: bollard::models::ContainerInspectResponse,
) -> ContainerSnapshot {
    let config = details.config.unwrap_or_default();
    let host = details.host_config.unwrap_or_default();
    let networks = details
        .network_settings
        .and_then(|n| n.networks)
        .unwrap_or_default();

    let container = ContainerSpec {
        image: config.image.unwrap_or_default(),
        cmd: config.cmd,
        env: config.env,
        exposed_ports: key_set(config.exposed_ports),
        labels: config.labels.map(|l| l.into_iter().collect()),
        volumes: key_set(config.volumes),
        working_dir: config.working_dir,
        entrypoint: config.entrypoint,
    };

    let host = HostSpec {
        binds: host.binds,
        port_bindings: host.port_bindings.map(|ports| {
            ports
                .into_iter()
                .map(|(port, bindings)| {
                    let bindings = bindings.map(|list| {
                        list.into_iter()
                            .map(|b| PortBinding {
                                host_ip: b.host_ip,
                                host_port: b.host_port,
                            })
                            .collect()
                    });
                    (port, bindings)
                })
                .collect()
        }),
        restart_policy: host.restart_policy.map(|p| RestartPolicy {
            name: p
                .name
                .map(restart_policy_name)
                .unwrap_or_default()
                .to_owned(),
            maximum_retry_count: p.maximum_retry_count,
        }),
        network_mode: host.network_mode,
        privileged: host.privileged,
        publish_all_ports: host.publish_all_ports,
        volumes_from: host.volumes_from,
    };

    let networks: BTreeMap<String, EndpointSpec> = networks
        .into_iter()
        .map(|(name, ep)| {
            let spec = EndpointSpec {
                ipam_config: ep.ipam_config.map(|ipam| IpamSpec {
                    ipv4_address: ipam.ipv4_address,
                    ipv6_address: ipam.ipv6_address,
                    link_local_ips: ipam.link_local_ips,
                }),
                links: ep.links,
                aliases: ep.aliases,
                network_id: ep.network_id,
                endpoint_id: ep.endpoint_id,
                gateway: ep.gateway,
                ip_address: ep.ip_address,
                ip_prefix_len: ep.ip_prefix_len,
                ipv6_gateway: ep.ipv6_gateway,
                global_ipv6_address: ep.global_ipv6_address,
                global_ipv6_prefix_len: ep.global_ipv6_prefix_len,
                mac_address: ep.mac_address,
            };
            (name, spec)
        })
        .collect();

    ContainerSnapshot {
        id: details.id.unwrap_or_default(),
        name: details
            .name
            .map(|n| strip_name_prefix(&n).to_owned())
            .unwrap_or_default(),
        running: details.state.and_then(|s| s.running).unwrap_or(false),
        container,
        host,
        networks,
    }
}

/// Builds the create request that reproduces a snapshot.
pub(crate) fn create_config_from_snapshot(
    snapshot: &ContainerSnapshot,
) -> bollard::container::Config<String> {
    use bollard::container::{Config, NetworkingConfig};
    use bollard::models::{EndpointIpamConfig, EndpointSettings, HostConfig};

    let spec = &snapshot.container;
    let host = &snapshot.host;

    let port_bindings = host.port_bindings.as_ref().map(|ports| {
        ports
            .iter()
            .map(|(port, bindings)| {
                let bindings = bindings.as_ref().map(|list| {
                    list.iter()
                        .map(|b| bollard::models::PortBinding {
                            host_ip: b.host_ip.clone(),
                            host_port: b.host_port.clone(),
                        })
                        .collect()
                });
                (port.clone(), bindings)
            })
            .collect()
    });

    let restart_policy = host
        .restart_policy
        .as_ref()
        .map(|p| bollard::models::RestartPolicy {
            name: restart_policy_enum(&p.name),
            maximum_retry_count: p.maximum_retry_count,
        });

    let host_config = HostConfig {
        binds: host.binds.clone(),
        port_bindings,
        restart_policy,
        network_mode: host.network_mode.clone(),
        privileged: host.privileged,
        publish_all_ports: host.publish_all_ports,
        volumes_from: host.volumes_from.clone(),
        ..Default::default()
    };

    let endpoints_config: HashMap<String, EndpointSettings> = snapshot
        .networks
        .iter()
        .map(|(name, ep)| {
            let settings = EndpointSettings {
                ipam_config: ep.ipam_config.as_ref().map(|ipam| EndpointIpamConfig {
                    ipv4_address: ipam.ipv4_address.clone(),
                    ipv6_address: ipam.ipv6_address.clone(),
                    link_local_ips: ipam.link_local_ips.clone(),
                }),
                links: ep.links.clone(),
                aliases: ep.aliases.clone(),
                network_id: ep.network_id.clone(),
                endpoint_id: ep.endpoint_id.clone(),
                gateway: ep.gateway.clone(),
                ip_address: ep.ip_address.clone(),
                ip_prefix_len: ep.ip_prefix_len,
                ipv6_gateway: ep.ipv6_gateway.clone(),
                global_ipv6_address: ep.global_ipv6_address.clone(),
                global_ipv6_prefix_len: ep.global_ipv6_prefix_len,
                mac_address: ep.mac_address.clone(),
                ..Default::default()
            };
            (name.clone(), settings)
        })
        .collect();

    Config {
        image: Some(spec.image.clone()),
        cmd: spec.cmd.clone(),
        env: spec.env.clone(),
        exposed_ports: key_map(&spec.exposed_ports),
        labels: spec
            .labels
            .as_ref()
            .map(|l| l.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        volumes: key_map(&spec.volumes),
        working_dir: spec.working_dir.clone(),
        entrypoint: spec.entrypoint.clone(),
        host_config: Some(host_config),
        networking_config: Some(NetworkingConfig { endpoints_config }),
        ..Default::default()
    }
}

// --- test double ---

/// Runtime operations recorded by `MockDockerClient`.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Inspect,
    Pull,
    Stop,
    Remove,
    Create,
    Start,
    Rename,
    Ping,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
enum FailMode {
    Always,
    /// 1-based call number
    OnCall(usize),
}

#[cfg(test)]
#[derive(Default)]
struct MockState {
    containers: BTreeMap<String, ContainerSnapshot>,
    calls: Vec<(Operation, String)>,
    failures: HashMap<Operation, FailMode>,
    created: Vec<String>,
    next_id: u64,
}

/// 테스트용 Mock Docker 클라이언트
///
/// 컨테이너 상태를 메모리에 유지하고 모든 호출을 순서대로 기록합니다.
/// `with_failure`로 특정 연산을 실패시킬 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    state: std::sync::Mutex<MockState>,
    unhealthy_new_containers: bool,
}

#[cfg(test)]
impl MockDockerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트용 컨테이너를 추가합니다.
    pub fn with_container(self, snapshot: ContainerSnapshot) -> Self {
        self.lock().containers.insert(snapshot.id.clone(), snapshot);
        self
    }

    /// 해당 연산의 모든 호출이 실패하도록 설정합니다.
    pub fn with_failure(self, op: Operation) -> Self {
        self.lock().failures.insert(op, FailMode::Always);
        self
    }

    /// 해당 연산의 `n`번째 호출(1부터)만 실패하도록 설정합니다.
    pub fn with_failure_on_call(self, op: Operation, n: usize) -> Self {
        self.lock().failures.insert(op, FailMode::OnCall(n));
        self
    }

    /// mock이 생성한 컨테이너는 start 후에도 실행 중이 아니도록 설정합니다.
    pub fn with_unhealthy_new_containers(mut self) -> Self {
        self.unhealthy_new_containers = true;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 기록된 (연산, 대상) 목록
    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.lock().calls.clone()
    }

    /// 기록된 연산 목록
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().calls.iter().map(|(op, _)| *op).collect()
    }

    /// 해당 연산의 호출 횟수
    pub fn call_count(&self, op: Operation) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    pub fn container_by_name(&self, name: &str) -> Option<ContainerSnapshot> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .containers
            .values()
            .map(|c| c.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// 호출을 기록하고, 실패가 주입된 경우 에러를 반환합니다.
    fn record(&self, op: Operation, target: &str) -> Result<(), UpdaterError> {
        let mut state = self.lock();
        state.calls.push((op, target.to_owned()));
        let count = state.calls.iter().filter(|(o, _)| *o == op).count();
        let fail = match state.failures.get(&op) {
            Some(FailMode::Always) => true,
            Some(FailMode::OnCall(n)) => *n == count,
            None => false,
        };
        if fail {
            let reason = format!("mock {op:?} failure");
            return Err(if op == Operation::List {
                UpdaterError::ListFailed(reason)
            } else {
                UpdaterError::DockerApi(reason)
            });
        }
        Ok(())
    }

    fn name_taken(state: &MockState, name: &str) -> bool {
        state.containers.values().any(|c| c.name == name)
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, UpdaterError> {
        self.record(Operation::List, "")?;
        Ok(self
            .lock()
            .containers
            .values()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.container.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_owned(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, UpdaterError> {
        self.record(Operation::Inspect, id)?;
        self.lock()
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))
    }

    async fn pull_image(&self, reference: &str) -> Result<(), UpdaterError> {
        self.record(Operation::Pull, reference)
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<(), UpdaterError> {
        self.record(Operation::Stop, id)?;
        let mut state = self.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), UpdaterError> {
        self.record(Operation::Remove, id)?;
        self.lock()
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))
    }

    async fn create_container(
        &self,
        name: &str,
        snapshot: &ContainerSnapshot,
    ) -> Result<String, UpdaterError> {
        self.record(Operation::Create, name)?;
        let mut state = self.lock();
        if Self::name_taken(&state, name) {
            return Err(UpdaterError::DockerApi(format!(
                "conflict: name {name} already in use"
            )));
        }
        state.next_id += 1;
        let id = format!("{:064x}", 0xc0de_0000_u64 + state.next_id);
        let created = ContainerSnapshot {
            id: id.clone(),
            name: name.to_owned(),
            running: false,
            ..snapshot.clone()
        };
        state.containers.insert(id.clone(), created);
        state.created.push(id.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), UpdaterError> {
        self.record(Operation::Start, id)?;
        let mut state = self.lock();
        let created_here = state.created.iter().any(|c| c == id);
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        container.running = !(created_here && self.unhealthy_new_containers);
        Ok(())
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), UpdaterError> {
        self.record(Operation::Rename, id)?;
        let mut state = self.lock();
        if Self::name_taken(&state, new_name) {
            return Err(UpdaterError::DockerApi(format!(
                "conflict: name {new_name} already in use"
            )));
        }
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| UpdaterError::ContainerNotFound(id.to_owned()))?;
        container.name = new_name.to_owned();
        Ok(())
    }

    async fn ping(&self) -> Result<(), UpdaterError> {
        self.record(Operation::Ping, "")
    }
}

/// 테스트용 스냅샷을 생성합니다.
#[cfg(test)]
pub fn test_snapshot(id: &str, name: &str, image: &str, running: bool) -> ContainerSnapshot {
    ContainerSnapshot {
        id: id.to_owned(),
        name: name.to_owned(),
        running,
        container: ContainerSpec {
            image: image.to_owned(),
            env: Some(vec!["MODE=prod".to_owned()]),
            ..Default::default()
        },
        host: HostSpec {
            binds: Some(vec!["/srv/data:/data".to_owned()]),
            restart_policy: Some(RestartPolicy {
                name: "unless-stopped".to_owned(),
                maximum_retry_count: None,
            }),
            ..Default::default()
        },
        networks: BTreeMap::new(),
    }
}
