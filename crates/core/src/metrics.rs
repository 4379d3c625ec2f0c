//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `hikup_`
//! - 모듈명: `updater_`, `policy_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 파이프라인 단계 레이블 키 (inspect, pull, stop, ...)
pub const LABEL_STEP: &str = "step";

/// 재생성 전략 레이블 키 (shadow, replace)
pub const LABEL_STRATEGY: &str = "strategy";

// ─── Updater 메트릭 ────────────────────────────────────────────────

/// Updater: 완료된 폴링 주기 수 (counter)
pub const UPDATER_CYCLES_TOTAL: &str = "hikup_updater_cycles_total";

/// Updater: 목록 조회 실패로 건너뛴 주기 수 (counter)
pub const UPDATER_LIST_FAILURES_TOTAL: &str = "hikup_updater_list_failures_total";

/// Updater: 마지막 주기에 조회된 컨테이너 수 (gauge)
pub const UPDATER_CONTAINERS_LISTED: &str = "hikup_updater_containers_listed";

/// Updater: 정책에 의해 선택된 컨테이너 수 (counter)
pub const UPDATER_CONTAINERS_SELECTED_TOTAL: &str = "hikup_updater_containers_selected_total";

/// Updater: 재생성 시도 수 (counter, label: result, strategy)
pub const UPDATER_RECREATIONS_TOTAL: &str = "hikup_updater_recreations_total";

/// Updater: 단계별 재생성 실패 수 (counter, label: step)
pub const UPDATER_STEP_FAILURES_TOTAL: &str = "hikup_updater_step_failures_total";

/// Updater: 원본 복구(rollback) 수 (counter, label: result)
pub const UPDATER_ROLLBACKS_TOTAL: &str = "hikup_updater_rollbacks_total";

/// Updater: 컨테이너 1개 재생성 소요 시간 (histogram, 초)
pub const UPDATER_RECREATE_DURATION_SECONDS: &str = "hikup_updater_recreate_duration_seconds";

// ─── Policy 메트릭 ─────────────────────────────────────────────────

/// Policy: 정책 리로드 시도 수 (counter, label: result)
pub const POLICY_RELOADS_TOTAL: &str = "hikup_policy_reloads_total";

/// Policy: 현재 include 패턴 수 (gauge)
pub const POLICY_INCLUDE_PATTERNS: &str = "hikup_policy_include_patterns";

/// Policy: 현재 exclude 패턴 수 (gauge)
pub const POLICY_EXCLUDE_PATTERNS: &str = "hikup_policy_exclude_patterns";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "hikup_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "hikup_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 재생성 소요 시간 버킷 (초). pull 시간이 대부분을 차지합니다.
pub const RECREATE_DURATION_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

/// 전체 메트릭 이름 목록
pub const ALL_METRIC_NAMES: &[&str] = &[
    UPDATER_CYCLES_TOTAL,
    UPDATER_LIST_FAILURES_TOTAL,
    UPDATER_CONTAINERS_LISTED,
    UPDATER_CONTAINERS_SELECTED_TOTAL,
    UPDATER_RECREATIONS_TOTAL,
    UPDATER_STEP_FAILURES_TOTAL,
    UPDATER_ROLLBACKS_TOTAL,
    UPDATER_RECREATE_DURATION_SECONDS,
    POLICY_RELOADS_TOTAL,
    POLICY_INCLUDE_PATTERNS,
    POLICY_EXCLUDE_PATTERNS,
    DAEMON_UPTIME_SECONDS,
    DAEMON_BUILD_INFO,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Updater
    describe_counter!(UPDATER_CYCLES_TOTAL, "Total number of completed poll cycles");
    describe_counter!(
        UPDATER_LIST_FAILURES_TOTAL,
        "Total number of poll cycles skipped because listing containers failed"
    );
    describe_gauge!(
        UPDATER_CONTAINERS_LISTED,
        "Number of containers seen in the most recent poll cycle"
    );
    describe_counter!(
        UPDATER_CONTAINERS_SELECTED_TOTAL,
        "Total number of containers selected for update by policy"
    );
    describe_counter!(
        UPDATER_RECREATIONS_TOTAL,
        "Total number of container recreations by result"
    );
    describe_counter!(
        UPDATER_STEP_FAILURES_TOTAL,
        "Total number of recreate pipeline failures by step"
    );
    describe_counter!(
        UPDATER_ROLLBACKS_TOTAL,
        "Total number of shadow rollbacks by result"
    );
    describe_histogram!(
        UPDATER_RECREATE_DURATION_SECONDS,
        "Time to recreate a single container in seconds"
    );

    // Policy
    describe_counter!(
        POLICY_RELOADS_TOTAL,
        "Total number of policy reload attempts by result"
    );
    describe_gauge!(
        POLICY_INCLUDE_PATTERNS,
        "Number of include patterns in the active policy"
    );
    describe_gauge!(
        POLICY_EXCLUDE_PATTERNS,
        "Number of exclude patterns in the active policy"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "hikup daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "hikup build information");
}
