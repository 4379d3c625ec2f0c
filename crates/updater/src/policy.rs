//! 업데이트 정책 -- include/exclude 목록 정의, 파일 로딩, 공유 저장소
//!
//! [`PolicyConfig`]는 어떤 컨테이너를 갱신할지 결정하는 두 개의 이름 목록입니다.
//! [`PolicyStore`]는 현재 활성 정책을 `RwLock<Arc<PolicyConfig>>`로 보관하며,
//! 리로드 시 새 인스턴스 전체를 원자적으로 교체합니다 (필드 단위 병합 없음).
//!
//! 정책 파일은 확장자로 형식을 결정합니다 (대소문자 무시):
//! `.json` -> JSON, `.yaml`/`.yml` -> YAML.
//!
//! ```yaml
//! include_containers:
//!   - "*"
//! exclude_containers:
//!   - postgres
//! ```

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use hikup_core::error::ConfigError;
use hikup_core::metrics as m;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum policy file size (1 MiB)
const MAX_POLICY_FILE_SIZE: u64 = 1024 * 1024;

/// `include_containers`에서 모든 컨테이너를 의미하는 패턴
pub const WILDCARD: &str = "*";

/// 업데이트 정책
///
/// 누락된 키는 빈 목록, 알 수 없는 키는 무시됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub include_containers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exclude_containers: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PolicyConfig {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_containers: include,
            exclude_containers: exclude,
        }
    }

    /// `include_containers`에 `"*"`가 있는지 확인합니다.
    pub fn has_wildcard(&self) -> bool {
        self.include_containers.iter().any(|p| p == WILDCARD)
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.include_containers.iter().any(|p| p == name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_containers.iter().any(|p| p == name)
    }

    pub fn is_empty(&self) -> bool {
        self.include_containers.is_empty() && self.exclude_containers.is_empty()
    }
}

/// 정책 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Json,
    Yaml,
}

impl PolicyFormat {
    /// 파일 확장자에서 형식을 결정합니다.
    ///
    /// # Errors
    /// 확장자가 없거나 지원하지 않으면 `ConfigError::UnsupportedFormat`
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_owned()
                } else {
                    format!(".{extension}")
                },
            }),
        }
    }

    /// 문자열을 이 형식으로 파싱합니다.
    pub fn parse(self, content: &str) -> Result<PolicyConfig, ConfigError> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed {
                reason: format!("invalid JSON policy: {e}"),
            }),
            Self::Yaml => {
                // an empty YAML document is an empty policy
                if content.trim().is_empty() {
                    return Ok(PolicyConfig::default());
                }
                let value: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseFailed {
                        reason: format!("invalid YAML policy: {e}"),
                    })?;
                if value.is_null() {
                    return Ok(PolicyConfig::default());
                }
                serde_yaml::from_value(value).map_err(|e| ConfigError::ParseFailed {
                    reason: format!("invalid YAML policy: {e}"),
                })
            }
        }
    }
}

/// 정책 파일을 읽어 파싱합니다.
///
/// # Errors
/// - 지원하지 않는 확장자
/// - 파일 없음 / 읽기 실패
/// - 크기 초과 (1 MiB)
/// - 파싱 실패
pub fn load_policy_from_file(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let format = PolicyFormat::from_path(path)?;
    let display = path.display().to_string();

    // Check file size before reading to prevent OOM
    let metadata = std::fs::metadata(path).map_err(|e| read_error(&display, e))?;
    if metadata.len() > MAX_POLICY_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: display,
            size: metadata.len(),
            max: MAX_POLICY_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| read_error(&display, e))?;
    format.parse(&content)
}

fn read_error(path: &str, err: std::io::Error) -> ConfigError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ConfigError::FileNotFound {
            path: path.to_owned(),
        }
    } else {
        ConfigError::Read {
            path: path.to_owned(),
            reason: err.to_string(),
        }
    }
}

/// 성공한 로드의 요약
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLoaded {
    pub include: usize,
    pub exclude: usize,
}

/// 활성 정책 저장소
///
/// 읽기는 `Arc`를 복제해 반환하므로 호출자는 잠금 없이 스냅샷을 사용합니다.
/// 잠금은 교체 순간에만 배타적이며, I/O나 `.await` 동안 잡지 않습니다.
#[derive(Debug, Default)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicyConfig>>,
}

impl PolicyStore {
    /// 빈 정책으로 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: PolicyConfig) -> Self {
        record_gauges(&policy);
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// 정책 파일에서 저장소를 생성합니다.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_policy_from_file(path.as_ref()).map(Self::with_policy)
    }

    /// 파일을 파싱해 활성 정책을 교체합니다.
    ///
    /// 실패 시 기존 정책은 그대로 유지되고 에러가 반환됩니다.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<PolicyLoaded, ConfigError> {
        let policy = load_policy_from_file(path.as_ref())?;
        let loaded = PolicyLoaded {
            include: policy.include_containers.len(),
            exclude: policy.exclude_containers.len(),
        };
        self.replace(policy);
        Ok(loaded)
    }

    /// 메모리 상의 정책으로 활성 정책을 교체합니다.
    pub fn replace(&self, policy: PolicyConfig) {
        record_gauges(&policy);
        let next = Arc::new(policy);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// 현재 활성 정책을 반환합니다.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }
}

fn record_gauges(policy: &PolicyConfig) {
    metrics::gauge!(m::POLICY_INCLUDE_PATTERNS).set(policy.include_containers.len() as f64);
    metrics::gauge!(m::POLICY_EXCLUDE_PATTERNS).set(policy.exclude_containers.len() as f64);
}
