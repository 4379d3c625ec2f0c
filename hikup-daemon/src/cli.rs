//! CLI argument definitions for hikup.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use hikup_core::config::HikupConfig;

use crate::orchestrator::RunOptions;

/// Policy-driven container auto-updater.
///
/// Periodically pulls the latest image for every selected container and
/// recreates it with its original runtime configuration. Send SIGHUP to
/// reload the policy file.
#[derive(Parser, Debug)]
#[command(name = "hikup")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Update every container, ignoring any policy.
    #[arg(short = 'a', long = "all", conflicts_with = "config")]
    pub all: bool,

    /// Path to the include/exclude policy file (.json, .yaml or .yml).
    ///
    /// Without it no container is selected unless `--all` is given.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to hikup.toml daemon settings.
    ///
    /// Defaults plus `HIKUP_*` environment variables are used when omitted.
    #[arg(long)]
    pub daemon_config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Logs are written to stdout only, with no syslog output. Run under
    /// systemd (journald) or a container log driver to collect them.
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Run a single update cycle and exit.
    #[arg(long, conflicts_with = "validate")]
    pub once: bool,

    /// Validate configuration and policy files, then exit.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut HikupConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force_all: self.all,
            policy_path: self.config.clone(),
        }
    }
}
