//! 도메인 타입 -- 컨테이너 목록 요약과 재생성용 스냅샷
//!
//! [`ContainerSummary`]는 목록 조회 결과 한 건을 나타내고,
//! [`ContainerSnapshot`]은 검사(inspect) 시점의 전체 런타임 명세를 담습니다.
//! 스냅샷은 컨테이너를 삭제한 뒤 동일하게 다시 만드는 유일한 입력이므로
//! 파괴적인 단계 이전에 캡처되고, 이후에는 변경되지 않습니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 컨테이너 ID를 로그용 12자 형태로 줄입니다.
pub fn short_id(id: &str) -> &str {
    &id[..12.min(id.len())]
}

/// 런타임이 붙이는 이름 접두어(`/`)를 제거합니다.
pub fn strip_name_prefix(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// 컨테이너 목록 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (`/` 접두어 제거됨)
    pub name: String,
    /// 이미지 참조
    pub image: String,
    /// 상태 (running, exited 등)
    pub state: String,
}

impl fmt::Display for ContainerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) image={} state={}",
            self.name,
            short_id(&self.id),
            self.image,
            self.state,
        )
    }
}

/// 컨테이너 단위 명세 (이미지, 명령, 환경변수 등)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// 이미지 참조 (사용자가 지정한 태그 형태)
    pub image: String,
    pub cmd: Option<Vec<String>>,
    pub env: Option<Vec<String>>,
    /// 노출 포트 (`80/tcp` 형식)
    pub exposed_ports: Option<Vec<String>>,
    pub labels: Option<BTreeMap<String, String>>,
    /// 선언된 볼륨 마운트 지점
    pub volumes: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub entrypoint: Option<Vec<String>>,
}

/// 호스트 측 명세 (바인드, 포트 바인딩, 재시작 정책 등)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub binds: Option<Vec<String>>,
    /// 컨테이너 포트 (`80/tcp`) -> 호스트 바인딩 목록
    pub port_bindings: Option<BTreeMap<String, Option<Vec<PortBinding>>>>,
    pub restart_policy: Option<RestartPolicy>,
    pub network_mode: Option<String>,
    pub privileged: Option<bool>,
    pub publish_all_ports: Option<bool>,
    pub volumes_from: Option<Vec<String>>,
}

/// 호스트 포트 바인딩
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

/// 재시작 정책
///
/// `name`은 런타임 표기(`no`, `always`, `unless-stopped`, `on-failure`)를 그대로 유지합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub name: String,
    pub maximum_retry_count: Option<i64>,
}

/// IPAM 고정 주소 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamSpec {
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub link_local_ips: Option<Vec<String>>,
}

/// 네트워크별 엔드포인트 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub ipam_config: Option<IpamSpec>,
    pub links: Option<Vec<String>>,
    pub aliases: Option<Vec<String>>,
    pub network_id: Option<String>,
    pub endpoint_id: Option<String>,
    pub gateway: Option<String>,
    pub ip_address: Option<String>,
    pub ip_prefix_len: Option<i64>,
    pub ipv6_gateway: Option<String>,
    pub global_ipv6_address: Option<String>,
    pub global_ipv6_prefix_len: Option<i64>,
    pub mac_address: Option<String>,
}

/// 컨테이너 재생성 스냅샷
///
/// 검사 시점에 캡처한 컨테이너의 식별 정보와 전체 런타임 명세입니다.
/// 한 번의 재생성 파이프라인이 독점적으로 소유하며, 주기 간에 캐시하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (`/` 접두어 제거됨)
    pub name: String,
    /// 검사 시점에 실행 중이었는지 여부
    pub running: bool,
    /// 컨테이너 명세
    pub container: ContainerSpec,
    /// 호스트 명세
    pub host: HostSpec,
    /// 네트워크 이름 -> 엔드포인트 설정
    pub networks: BTreeMap<String, EndpointSpec>,
}

impl ContainerSnapshot {
    /// 스냅샷에 기록된 이미지 참조를 반환합니다.
    pub fn image(&self) -> &str {
        &self.container.image
    }
}

impl fmt::Display for ContainerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) image={} running={} networks={}",
            self.name,
            short_id(&self.id),
            self.container.image,
            self.running,
            self.networks.len(),
        )
    }
}
