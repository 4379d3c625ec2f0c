//! 업데이트 대상 선택
//!
//! 컨테이너 이름, `--all` 플래그, 현재 정책으로부터 갱신 여부를 결정하는 순수 함수입니다.
//! 평가 순서:
//!
//! 1. `force_all` -> 갱신
//! 2. include에 `"*"` -> exclude에 없으면 갱신
//! 3. include에 이름이 있으면 갱신
//! 4. exclude에 이름이 있으면 제외
//! 5. 그 외 -> 제외 (기본 거부)
//!
//! 이름은 런타임의 `/` 접두어를 제거한 형태여야 하며, 비교는 정확히 일치할 때만 성립합니다.

use std::fmt;

use crate::policy::PolicyConfig;

/// 선택 결과와 그 근거
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `--all` 모드
    Forced,
    /// include의 `"*"`에 매칭
    Wildcard,
    /// include에 이름이 있음
    Included,
    /// exclude에 이름이 있음
    Excluded,
    /// `"*"`가 있지만 exclude에 이름이 있음
    WildcardExcluded,
    /// 어느 목록에도 없음
    NotListed,
}

impl Decision {
    pub fn should_update(self) -> bool {
        matches!(self, Self::Forced | Self::Wildcard | Self::Included)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::Wildcard => "wildcard",
            Self::Included => "included",
            Self::Excluded => "excluded",
            Self::WildcardExcluded => "wildcard_excluded",
            Self::NotListed => "not_listed",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 컨테이너 하나에 대한 결정을 근거와 함께 반환합니다.
pub fn evaluate(name: &str, force_all: bool, policy: &PolicyConfig) -> Decision {
    if force_all {
        return Decision::Forced;
    }
    if policy.has_wildcard() {
        return if policy.is_excluded(name) {
            Decision::WildcardExcluded
        } else {
            Decision::Wildcard
        };
    }
    if policy.is_included(name) {
        return Decision::Included;
    }
    if policy.is_excluded(name) {
        return Decision::Excluded;
    }
    Decision::NotListed
}

/// 컨테이너를 갱신해야 하는지 반환합니다.
pub fn should_update(name: &str, force_all: bool, policy: &PolicyConfig) -> bool {
    evaluate(name, force_all, policy).should_update()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(include: &[&str], exclude: &[&str]) -> PolicyConfig {
        PolicyConfig::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn wildcard_selects_unexcluded_names() {
        let p = policy(&["*"], &["cache"]);
        assert_eq!(evaluate("web", false, &p), Decision::Wildcard);
        assert_eq!(evaluate("cache", false, &p), Decision::WildcardExcluded);
        assert!(should_update("web", false, &p));
        assert!(!should_update("cache", false, &p));
        assert!(should_update("db", false, &p));
    }

    #[test]
    fn exact_include_beats_exact_exclude() {
        let p = policy(&["web"], &["web"]);
        assert_eq!(evaluate("web", false, &p), Decision::Included);
    }

    #[test]
    fn wildcard_exclude_beats_exact_include() {
        let p = policy(&["*", "web"], &["web"]);
        assert_eq!(evaluate("web", false, &p), Decision::WildcardExcluded);
        assert!(!should_update("web", false, &p));
    }

    #[test]
    fn unlisted_name_is_denied() {
        let p = policy(&["web"], &[]);
        assert!(should_update("web", false, &p));
        assert_eq!(evaluate("db", false, &p), Decision::NotListed);
        assert!(!should_update("db", false, &p));
    }

    #[test]
    fn excluded_without_wildcard() {
        let p = policy(&["web"], &["db"]);
        assert_eq!(evaluate("db", false, &p), Decision::Excluded);
    }

    #[test]
    fn force_all_overrides_any_policy() {
        for p in [
            PolicyConfig::default(),
            policy(&[], &["web"]),
            policy(&["*"], &["web"]),
        ] {
            assert_eq!(evaluate("web", true, &p), Decision::Forced);
        }
    }

    #[test]
    fn empty_policy_denies_everything() {
        let p = PolicyConfig::default();
        for name in ["web", "db", "*", ""] {
            assert!(!should_update(name, false, &p));
        }
    }

    #[test]
    fn matching_is_exact() {
        let p = policy(&["web"], &[]);
        assert!(!should_update("web-1", false, &p));
        assert!(!should_update("Web", false, &p));
        assert!(!should_update("/web", false, &p));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let p = policy(&["*"], &["cache"]);
        let first = evaluate("cache", false, &p);
        for _ in 0..10 {
            assert_eq!(evaluate("cache", false, &p), first);
        }
    }

    #[test]
    fn decision_names() {
        assert_eq!(Decision::WildcardExcluded.to_string(), "wildcard_excluded");
        assert!(!Decision::NotListed.should_update());
        assert!(Decision::Forced.should_update());
    }
}
