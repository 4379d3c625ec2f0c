//! Integration tests for metrics server functionality.

use hikup_core::config::MetricsConfig;
use hikup_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: A valid metrics configuration
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19187, // Non-standard port to avoid conflicts
        endpoint: "/metrics".to_owned(),
    };

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should succeed
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9187,
        endpoint: "/metrics".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);

    assert!(result.is_err(), "should fail with invalid address");
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19188,
        endpoint: "/custom".to_owned(),
    };

    let result = metrics_server::install_metrics_recorder(&config);

    let err = result.expect_err("custom endpoint should be rejected");
    assert!(err.to_string().contains("/custom"));
}

#[test]
fn test_listen_addr_parses_ipv4_and_ipv6() {
    let v4 = MetricsConfig {
        listen_addr: "0.0.0.0".to_owned(),
        port: 9187,
        ..Default::default()
    };
    assert_eq!(
        metrics_server::listen_addr(&v4).expect("v4").to_string(),
        "0.0.0.0:9187"
    );

    let v6 = MetricsConfig {
        listen_addr: "[::1]".to_owned(),
        port: 9187,
        ..Default::default()
    };
    assert!(metrics_server::listen_addr(&v6).expect("v6").is_ipv6());
}
