//! Command-line parsing and override tests.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use hikup_core::config::HikupConfig;
use hikup_daemon::cli::DaemonCli;

#[test]
fn test_all_and_config_are_mutually_exclusive() {
    // Given: Both -a and -c
    let result = DaemonCli::try_parse_from(["hikup", "-a", "-c", "/etc/hikup/policy.yaml"]);

    // Then: Parsing fails with an argument conflict
    let err = result.expect_err("-a and -c must conflict");
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[test]
fn test_long_forms_also_conflict() {
    let result = DaemonCli::try_parse_from(["hikup", "--all", "--config", "policy.json"]);
    assert!(result.is_err());
}

#[test]
fn test_all_alone_forces_update() {
    // When: Only -a is given
    let cli = DaemonCli::try_parse_from(["hikup", "-a"]).expect("should parse");

    // Then: Run options force every container, with no policy file
    let options = cli.run_options();
    assert!(options.force_all);
    assert!(options.policy_path.is_none());
}

#[test]
fn test_config_alone_sets_policy_path() {
    let cli = DaemonCli::try_parse_from(["hikup", "-c", "/etc/hikup/policy.yaml"])
        .expect("should parse");

    let options = cli.run_options();
    assert!(!options.force_all);
    assert_eq!(
        options.policy_path,
        Some(PathBuf::from("/etc/hikup/policy.yaml"))
    );
}

#[test]
fn test_no_arguments_is_valid() {
    // Given: No arguments (empty policy, nothing selected)
    let cli = DaemonCli::try_parse_from(["hikup"]).expect("should parse");

    assert!(!cli.all);
    assert!(cli.config.is_none());
    assert!(cli.daemon_config.is_none());
    assert!(!cli.once);
    assert!(!cli.validate);
}

#[test]
fn test_once_conflicts_with_validate() {
    let result = DaemonCli::try_parse_from(["hikup", "--once", "--validate"]);
    assert!(result.is_err());
}

#[test]
fn test_overrides_take_precedence() {
    // Given: A config with file values
    let mut config = HikupConfig::default();
    config.general.log_level = "warn".to_owned();
    config.general.pid_file = "/run/hikup.pid".to_owned();

    let cli = DaemonCli::try_parse_from([
        "hikup",
        "--log-level",
        "debug",
        "--log-format",
        "pretty",
    ])
    .expect("should parse");

    // When: Applying CLI overrides
    cli.apply_overrides(&mut config);

    // Then: Given flags win, others are untouched
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.pid_file, "/run/hikup.pid");
}

#[test]
fn test_invalid_override_fails_validation() {
    let mut config = HikupConfig::default();
    let cli = DaemonCli::try_parse_from(["hikup", "--log-level", "loud"]).expect("should parse");

    cli.apply_overrides(&mut config);

    assert!(config.validate().is_err());
}

#[test]
fn test_log_format_help_names_log_collection() {
    let help = DaemonCli::command().render_long_help().to_string();

    assert!(help.contains("--log-format"));
    assert!(help.contains("journald"));
    assert!(help.contains("stdout"));
}
