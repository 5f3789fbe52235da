//! 탐지 규칙 엔진 -- 전체 이벤트 집합에 대한 규칙 평가
//!
//! 규칙은 [`Rule`] trait을 구현하는 순수 함수입니다. [`RuleSet`]은
//! [`RuleSetBuilder`]로 한 번 구성된 뒤 변경되지 않으며, `Arc<RuleSet>`로 공유됩니다.
//!
//! # 규칙 종류
//! - 내장 규칙: [`BruteForceRule`] (R-001)
//! - 선언형 규칙: YAML 파일에서 로드한 [`DetectionRule`]을 [`DeclarativeRule`]로 컴파일
//!
//! # 아키텍처
//! - [`RuleSet`]: 등록 순서를 유지하는 불변 규칙 집합, finding 생성
//! - [`builtin`]: 내장 규칙
//! - [`loader`]: YAML 파일 로딩 및 유효성 검증
//! - [`matcher`]: 조건 매칭 로직 (exact, contains, regex 등)
//! - [`types`]: 선언형 규칙 데이터 구조 정의

pub mod builtin;
pub mod loader;
pub mod matcher;
pub mod types;

pub use builtin::BruteForceRule;
pub use loader::RuleLoader;
pub use matcher::{DeclarativeRule, RuleMatcher};
pub use types::{ConditionModifier, DetectionRule, FieldCondition, RuleStatus, ThresholdConfig};

use std::collections::HashSet;

use incident_timeline_core::config::RulesConfig;
use incident_timeline_core::pipeline::Rule;
use incident_timeline_core::types::{Event, Finding};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::EngineError;

/// 규칙 요약 정보 (목록 출력용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    /// 규칙 ID
    pub id: String,
    /// 규칙 이름
    pub name: String,
    /// 규칙 설명
    pub description: String,
}

/// 불변 규칙 집합
///
/// 규칙은 등록 순서대로 평가되며, finding도 같은 순서로 반환됩니다.
/// 구성 후에는 규칙을 추가하거나 제거할 수 없습니다.
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    /// 새 빌더를 생성합니다.
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new()
    }

    /// 규칙이 없는 집합
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// 기본 내장 규칙만 포함한 집합
    pub fn with_builtins() -> Self {
        Self {
            rules: vec![Box::new(BruteForceRule::default())],
        }
    }

    /// 설정에 따라 내장 규칙과 규칙 디렉토리의 YAML 규칙을 로드합니다.
    pub async fn from_config(config: &RulesConfig) -> Result<Self, EngineError> {
        let mut builder = RuleSetBuilder::new();

        if config.builtin {
            builder = builder.add(BruteForceRule::new(config.brute_force_threshold))?;
        }

        if !config.rules_dir.is_empty() {
            let definitions = RuleLoader::load_directory(&config.rules_dir).await?;
            for definition in definitions {
                builder = builder.add_definition(definition)?;
            }
        }

        Ok(builder.build())
    }

    /// 등록된 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없으면 true
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 등록 순서대로 규칙 요약을 반환합니다.
    pub fn describe(&self) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|rule| RuleInfo {
                id: rule.id().to_owned(),
                name: rule.name().to_owned(),
                description: rule.description().to_owned(),
            })
            .collect()
    }

    /// 모든 규칙을 평가하여 발동한 규칙의 finding을 반환합니다.
    ///
    /// 평가 중 에러가 난 규칙은 경고 로그를 남기고 건너뛰며,
    /// 나머지 규칙의 평가에는 영향을 주지 않습니다.
    pub fn evaluate(&self, events: &[Event]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for rule in &self.rules {
            match rule.evaluate(events) {
                Ok(true) => {
                    debug!(rule_id = rule.id(), "rule triggered");
                    findings.push(Finding {
                        rule_id: rule.id().to_owned(),
                        rule_name: rule.name().to_owned(),
                        description: rule.description().to_owned(),
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        rule_id = rule.id(),
                        error = %e,
                        "rule evaluation failed, skipping"
                    );
                }
            }
        }

        findings
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.id()))
            .finish()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// 규칙 집합 빌더
///
/// 중복 ID를 거부하며, `build()` 이후에는 변경할 수 없습니다.
#[derive(Default)]
pub struct RuleSetBuilder {
    rules: Vec<Box<dyn Rule>>,
    ids: HashSet<String>,
}

impl RuleSetBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙을 추가합니다. 같은 ID가 이미 있으면 에러를 반환합니다.
    pub fn add(self, rule: impl Rule + 'static) -> Result<Self, EngineError> {
        self.add_boxed(Box::new(rule))
    }

    /// 박싱된 규칙을 추가합니다.
    pub fn add_boxed(mut self, rule: Box<dyn Rule>) -> Result<Self, EngineError> {
        if !self.ids.insert(rule.id().to_owned()) {
            return Err(EngineError::RuleValidation {
                rule_id: rule.id().to_owned(),
                reason: "duplicate rule id".to_owned(),
            });
        }
        self.rules.push(rule);
        Ok(self)
    }

    /// 선언형 규칙을 컴파일하여 추가합니다. 비활성화된 규칙은 건너뜁니다.
    pub fn add_definition(self, definition: DetectionRule) -> Result<Self, EngineError> {
        if !definition.is_enabled() {
            debug!(rule_id = %definition.id, "rule disabled, not registering");
            return Ok(self);
        }
        let rule = DeclarativeRule::compile(definition)?;
        self.add(rule)
    }

    /// 불변 규칙 집합을 생성합니다.
    pub fn build(self) -> RuleSet {
        RuleSet { rules: self.rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use incident_timeline_core::error::{RuleError, TimelineError};
    use incident_timeline_core::types::{EventMetadata, Level, WatchedKey};

    struct AlwaysFires(&'static str);

    impl Rule for AlwaysFires {
        fn id(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            "Always"
        }
        fn description(&self) -> &str {
            "fires on any input"
        }
        fn evaluate(&self, _events: &[Event]) -> Result<bool, TimelineError> {
            Ok(true)
        }
    }

    struct Broken;

    impl Rule for Broken {
        fn id(&self) -> &str {
            "broken"
        }
        fn name(&self) -> &str {
            "Broken"
        }
        fn description(&self) -> &str {
            "always errors"
        }
        fn evaluate(&self, _events: &[Event]) -> Result<bool, TimelineError> {
            Err(RuleError::Evaluation {
                rule_id: "broken".to_owned(),
                reason: "boom".to_owned(),
            }
            .into())
        }
    }

    fn failed_logins(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| {
                Event::new(i.to_string(), Utc::now(), Level::Warn, "auth", "failed login")
                    .with_metadata(EventMetadata::default().with(WatchedKey::Ip, "1.2.3.4"))
            })
            .collect()
    }

    #[test]
    fn findings_follow_registration_order() {
        let set = RuleSet::builder()
            .add(AlwaysFires("b"))
            .unwrap()
            .add(AlwaysFires("a"))
            .unwrap()
            .build();
        let ids: Vec<_> = set
            .evaluate(&[])
            .into_iter()
            .map(|f| f.rule_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn erroring_rule_does_not_suppress_others() {
        let set = RuleSet::builder()
            .add(Broken)
            .unwrap()
            .add(AlwaysFires("after"))
            .unwrap()
            .build();
        let findings = set.evaluate(&[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "after");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = RuleSet::builder()
            .add(AlwaysFires("x"))
            .unwrap()
            .add(AlwaysFires("x"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("duplicate rule id"));
    }

    #[test]
    fn builtin_set_produces_brute_force_finding() {
        let set = RuleSet::with_builtins();
        assert_eq!(set.len(), 1);
        assert!(set.evaluate(&failed_logins(3)).is_empty());
        let findings = set.evaluate(&failed_logins(4));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message(),
            "Rule Triggered: Potential Brute Force - More than 3 failed logins from the same IP"
        );
    }

    #[test]
    fn disabled_definition_is_skipped() {
        let definition = DetectionRule {
            id: "off".to_owned(),
            title: "Off".to_owned(),
            description: String::new(),
            status: RuleStatus::Disabled,
            conditions: vec![FieldCondition {
                field: "message".to_owned(),
                modifier: ConditionModifier::Contains,
                value: "login".to_owned(),
                case_insensitive: false,
            }],
            threshold: None,
        };
        let set = RuleSet::builder()
            .add_definition(definition)
            .unwrap()
            .build();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn from_config_respects_builtin_flag() {
        let mut config = RulesConfig::default();
        config.builtin = false;
        assert!(RuleSet::from_config(&config).await.unwrap().is_empty());

        config.builtin = true;
        config.brute_force_threshold = 5;
        let set = RuleSet::from_config(&config).await.unwrap();
        assert_eq!(set.describe()[0].description, "More than 5 failed logins from the same IP");
    }

    #[tokio::test]
    async fn from_config_loads_rules_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("login.yml"),
            r#"
id: D-100
title: Login Failure Burst
conditions:
  - field: message
    modifier: contains
    value: failed login
threshold:
  group_by: ip
  count: 1
"#,
        )
        .unwrap();

        let config = RulesConfig {
            builtin: true,
            brute_force_threshold: 3,
            rules_dir: dir.path().display().to_string(),
        };
        let set = RuleSet::from_config(&config).await.unwrap();
        assert_eq!(set.len(), 2);

        let findings = set.evaluate(&failed_logins(2));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "D-100");
    }
}
