//! Daemon orchestration -- assembly, signal wiring, and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, connects to the container
//! runtime, builds the [`Updater`], and runs it until a shutdown signal.
//!
//! # Signals
//!
//! - `SIGHUP`: forwarded into the updater's reload channel
//! - `SIGTERM` / `SIGINT`: graceful shutdown (in-flight recreations finish)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use hikup_core::config::{DockerConfig, HikupConfig};
use hikup_updater::{
    BollardDockerClient, CycleReport, DockerClient, Updater, UpdaterBuilder, UpdaterConfig,
    load_policy_from_file,
};

use crate::metrics_server;

/// Options decided on the command line rather than in hikup.toml.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Update every container regardless of policy (`-a`).
    pub force_all: bool,
    /// Policy file (`-c`).
    pub policy_path: Option<PathBuf>,
}

/// Load daemon settings from an optional TOML file.
///
/// Without a file, defaults plus `HIKUP_*` environment overrides are used.
pub async fn load_config(path: Option<&Path>) -> Result<HikupConfig> {
    match path {
        Some(path) => HikupConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e)),
        None => {
            HikupConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))
        }
    }
}

/// Check daemon settings and the policy file without touching the runtime.
///
/// Unlike daemon startup, an unreadable policy is an error here.
pub fn validate(config: &HikupConfig, options: &RunOptions) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    let updater_config =
        UpdaterConfig::from_core(&config.updater, options.force_all, options.policy_path.clone());
    updater_config
        .validate()
        .map_err(|e| anyhow::anyhow!("updater config validation failed: {}", e))?;

    if let Some(path) = &options.policy_path {
        let policy = load_policy_from_file(path)
            .map_err(|e| anyhow::anyhow!("policy validation failed: {}", e))?;
        tracing::info!(
            path = %path.display(),
            include = policy.include_containers.len(),
            exclude = policy.exclude_containers.len(),
            "policy file is valid"
        );
    }
    Ok(())
}

/// Connect to the container runtime.
///
/// An empty socket path uses `DOCKER_HOST` or the platform default.
pub fn connect_docker(config: &DockerConfig) -> Result<BollardDockerClient> {
    let client = if config.socket.is_empty() {
        BollardDockerClient::connect_local()
    } else {
        BollardDockerClient::connect_with_socket(&config.socket, config.connect_timeout_secs)
    };
    client.map_err(|e| anyhow::anyhow!("failed to create docker client: {}", e))
}

/// The main daemon orchestrator.
pub struct Orchestrator<D: DockerClient> {
    config: HikupConfig,
    updater: Updater<D>,
    /// Shutdown broadcast for daemon-side background tasks.
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Orchestrator<BollardDockerClient> {
    /// Connect to Docker and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the Docker
    /// client cannot be created. Both are fatal at startup.
    pub fn build(config: HikupConfig, options: RunOptions) -> Result<Self> {
        let docker = Arc::new(connect_docker(&config.docker)?);
        Self::build_with_client(config, options, docker)
    }
}

impl<D: DockerClient> Orchestrator<D> {
    /// Build from an already-loaded configuration and runtime client.
    pub fn build_with_client(
        config: HikupConfig,
        options: RunOptions,
        docker: Arc<D>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        if options.force_all {
            tracing::warn!("--all given, every container will be updated regardless of policy");
        }

        let updater_config =
            UpdaterConfig::from_core(&config.updater, options.force_all, options.policy_path);
        let updater = UpdaterBuilder::new()
            .config(updater_config)
            .docker_client(docker)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build updater: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            poll_interval_secs = config.updater.poll_interval_secs,
            strategy = %config.updater.recreate_strategy,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            updater,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Run exactly one update cycle (`--once`).
    pub async fn run_once(&self) -> Result<CycleReport> {
        let report = self
            .updater
            .run_once()
            .await
            .map_err(|e| anyhow::anyhow!("update cycle failed: {}", e))?;
        tracing::info!(
            listed = report.listed,
            selected = report.selected,
            updated = report.updated(),
            failed = report.failed(),
            "single cycle finished"
        );
        Ok(report)
    }

    /// Start the updater and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let reload_task =
            spawn_reload_forwarder(self.updater.reload_handle(), self.shutdown_tx.subscribe())?;
        let result = self.run_until(wait_for_shutdown_signal()).await;
        let _ = self.shutdown_tx.send(());
        if let Err(e) = reload_task.await {
            tracing::warn!(error = %e, "reload forwarder terminated abnormally");
        }
        result
    }

    /// Start the updater and block until `shutdown` resolves.
    ///
    /// The PID file, if configured, exists exactly while the updater runs.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = (!self.config.general.pid_file.is_empty())
            .then(|| PathBuf::from(&self.config.general.pid_file));
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        if let Err(e) = self.updater.start().await {
            tracing::error!(error = %e, "updater failed to start");
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(anyhow::anyhow!("failed to start updater: {}", e));
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("hikup running");
        let signal = shutdown.await;
        match &signal {
            Ok(name) => tracing::info!(signal = *name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed, stopping"),
        }

        // receivers may already be gone
        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        let stopped = self.updater.stop().await;

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }

        stopped.map_err(|e| anyhow::anyhow!("failed to stop updater: {}", e))?;
        signal.map(|_| ())
    }

    pub fn config(&self) -> &HikupConfig {
        &self.config
    }

    pub fn updater(&self) -> &Updater<D> {
        &self.updater
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Forward SIGHUP into the updater's reload channel.
///
/// A trigger that arrives while one is already queued is coalesced.
fn spawn_reload_forwarder(
    reload_tx: mpsc::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("failed to install SIGHUP handler: {}", e))?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = sighup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("SIGHUP received, reloading policy");
                    if !forward_reload(&reload_tx) {
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("reload forwarder shutting down");
                    break;
                }
            }
        }
    }))
}

/// Queue a reload trigger. Returns `false` once the updater is gone.
pub fn forward_reload(reload_tx: &mpsc::Sender<()>) -> bool {
    match reload_tx.try_send(()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(())) => {
            tracing::debug!("reload already pending, coalescing trigger");
            true
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            tracing::warn!("reload channel closed, ignoring further SIGHUP");
            false
        }
    }
}

/// Write the current process PID to a file.
///
/// Creation is atomic (`create_new`), so a second instance with the same
/// PID file fails instead of overwriting it.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file, logging instead of failing.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

fn record_daemon_metrics() {
    use hikup_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Refresh the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use hikup_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
