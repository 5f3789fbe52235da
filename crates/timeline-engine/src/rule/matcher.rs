//! 규칙 매칭 로직 -- 조건 평가 및 정규식 캐싱
//!
//! [`RuleMatcher`]는 선언형 규칙의 조건을 [`Event`]에 대해 평가합니다.
//! 정규식 패턴은 규칙 컴파일 시 한 번만 컴파일하여 캐싱합니다.
//! [`DeclarativeRule`]은 매처를 감싸 core의 [`Rule`] trait을 구현합니다.

use std::borrow::Cow;
use std::collections::HashMap;

use incident_timeline_core::error::{RuleError, TimelineError};
use incident_timeline_core::pipeline::Rule;
use incident_timeline_core::types::Event;
use regex::{Regex, RegexBuilder};

use super::types::{ConditionModifier, DetectionRule, FieldCondition};
use crate::error::EngineError;

/// 규칙 매처 -- 조건 평가 및 정규식 캐싱
pub struct RuleMatcher {
    /// 컴파일된 정규식 캐시: condition_index -> Regex
    regex_cache: HashMap<usize, Regex>,
}

impl RuleMatcher {
    /// 규칙의 정규식 조건을 미리 컴파일합니다.
    pub fn compile(rule: &DetectionRule) -> Result<Self, EngineError> {
        let mut regex_cache = HashMap::new();
        for (idx, condition) in rule.conditions.iter().enumerate() {
            if condition.modifier == ConditionModifier::Regex {
                let regex = RegexBuilder::new(&condition.value)
                    .case_insensitive(condition.case_insensitive)
                    .build()
                    .map_err(|e| EngineError::RuleValidation {
                        rule_id: rule.id.clone(),
                        reason: format!(
                            "invalid regex in condition[{idx}] for field '{}': {e}",
                            condition.field
                        ),
                    })?;
                regex_cache.insert(idx, regex);
            }
        }
        Ok(Self { regex_cache })
    }

    /// 규칙의 모든 조건이 이벤트에 매칭되는지 평가합니다.
    ///
    /// 모든 조건이 AND 결합이므로, 하나라도 실패하면 false를 반환합니다.
    pub fn matches(&self, rule: &DetectionRule, event: &Event) -> Result<bool, RuleError> {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            let matched = match field_value(event, &condition.field) {
                Some(value) => self.evaluate_condition(condition, &value, &rule.id, idx)?,
                None => false, // 필드가 없으면 매칭 실패
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// 단일 조건을 평가합니다.
    fn evaluate_condition(
        &self,
        condition: &FieldCondition,
        field_value: &str,
        rule_id: &str,
        condition_idx: usize,
    ) -> Result<bool, RuleError> {
        if condition.modifier == ConditionModifier::Regex {
            let regex = self
                .regex_cache
                .get(&condition_idx)
                .ok_or_else(|| RuleError::Evaluation {
                    rule_id: rule_id.to_owned(),
                    reason: format!("regex not compiled for condition[{condition_idx}]"),
                })?;
            return Ok(regex.is_match(field_value));
        }

        let (haystack, needle) = if condition.case_insensitive {
            (
                Cow::Owned(field_value.to_lowercase()),
                Cow::Owned(condition.value.to_lowercase()),
            )
        } else {
            (
                Cow::Borrowed(field_value),
                Cow::Borrowed(condition.value.as_str()),
            )
        };

        Ok(match condition.modifier {
            ConditionModifier::Exact => haystack == needle,
            ConditionModifier::Contains => haystack.contains(needle.as_ref()),
            ConditionModifier::StartsWith => haystack.starts_with(needle.as_ref()),
            ConditionModifier::EndsWith => haystack.ends_with(needle.as_ref()),
            ConditionModifier::Regex => false,
        })
    }
}

/// 이벤트에서 필드 값을 추출합니다.
fn field_value<'a>(event: &'a Event, field: &str) -> Option<Cow<'a, str>> {
    match field {
        "message" => Some(Cow::Borrowed(event.message.as_str())),
        "source" => Some(Cow::Borrowed(event.source.as_str())),
        "id" => Some(Cow::Borrowed(event.id.as_str())),
        "level" => Some(Cow::Borrowed(event.level.as_str())),
        _ => event.metadata.lookup(field),
    }
}

/// YAML에서 컴파일된 선언형 규칙
///
/// 임계값이 없으면 조건에 매칭되는 이벤트가 하나라도 있을 때 발동합니다.
/// 임계값이 있으면 `group_by` 키별 매칭 수가 `count`를 초과할 때 발동합니다.
pub struct DeclarativeRule {
    rule: DetectionRule,
    matcher: RuleMatcher,
}

impl DeclarativeRule {
    /// 규칙을 검증하고 컴파일합니다.
    pub fn compile(rule: DetectionRule) -> Result<Self, EngineError> {
        rule.validate()?;
        let matcher = RuleMatcher::compile(&rule)?;
        Ok(Self { rule, matcher })
    }

    /// 원본 규칙 정의
    pub fn definition(&self) -> &DetectionRule {
        &self.rule
    }
}

impl Rule for DeclarativeRule {
    fn id(&self) -> &str {
        &self.rule.id
    }

    fn name(&self) -> &str {
        &self.rule.title
    }

    fn description(&self) -> &str {
        &self.rule.description
    }

    fn evaluate(&self, events: &[Event]) -> Result<bool, TimelineError> {
        let Some(threshold) = &self.rule.threshold else {
            for event in events {
                if self.matcher.matches(&self.rule, event)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for event in events {
            let Some(key) = event.metadata.get(threshold.group_by) else {
                continue;
            };
            if self.matcher.matches(&self.rule, event)? {
                let count = counts.entry(key).or_insert(0);
                *count += 1;
                if *count > threshold.count {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for DeclarativeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeRule")
            .field("id", &self.rule.id)
            .field("conditions", &self.rule.conditions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use super::*;
    use chrono::Utc;
    use incident_timeline_core::types::{EventMetadata, Level, WatchedKey};

    fn sample_event() -> Event {
        let mut metadata = EventMetadata::default()
            .with(WatchedKey::Ip, "192.168.1.100")
            .with(WatchedKey::UserId, "root");
        metadata
            .extra
            .insert("port".to_owned(), serde_json::Value::from(22));
        Event::new(
            "e-1",
            Utc::now(),
            Level::Error,
            "sshd",
            "Failed password for root from 192.168.1.100 port 22",
        )
        .with_metadata(metadata)
    }

    fn condition(field: &str, modifier: ConditionModifier, value: &str) -> FieldCondition {
        FieldCondition {
            field: field.to_owned(),
            modifier,
            value: value.to_owned(),
            case_insensitive: false,
        }
    }

    fn make_rule(conditions: Vec<FieldCondition>) -> DetectionRule {
        DetectionRule {
            id: "test_rule".to_owned(),
            title: "Test".to_owned(),
            description: String::new(),
            status: RuleStatus::Enabled,
            conditions,
            threshold: None,
        }
    }

    fn matches(rule: &DetectionRule, event: &Event) -> bool {
        RuleMatcher::compile(rule)
            .unwrap()
            .matches(rule, event)
            .unwrap()
    }

    #[test]
    fn exact_match() {
        let rule = make_rule(vec![condition("source", ConditionModifier::Exact, "sshd")]);
        assert!(matches(&rule, &sample_event()));
    }

    #[test]
    fn exact_match_fails() {
        let rule = make_rule(vec![condition("source", ConditionModifier::Exact, "nginx")]);
        assert!(!matches(&rule, &sample_event()));
    }

    #[test]
    fn contains_starts_ends() {
        let event = sample_event();
        let rule = make_rule(vec![condition("message", ConditionModifier::Contains, "password")]);
        assert!(matches(&rule, &event));
        let rule = make_rule(vec![condition("message", ConditionModifier::StartsWith, "Failed")]);
        assert!(matches(&rule, &event));
        let rule = make_rule(vec![condition("message", ConditionModifier::EndsWith, "port 22")]);
        assert!(matches(&rule, &event));
    }

    #[test]
    fn case_insensitive_contains() {
        let mut cond = condition("message", ConditionModifier::Contains, "FAILED PASSWORD");
        assert!(!matches(&make_rule(vec![cond.clone()]), &sample_event()));
        cond.case_insensitive = true;
        assert!(matches(&make_rule(vec![cond]), &sample_event()));
    }

    #[test]
    fn regex_match_and_case_insensitive_regex() {
        let rule = make_rule(vec![condition(
            "message",
            ConditionModifier::Regex,
            r"from \d+\.\d+\.\d+\.\d+",
        )]);
        assert!(matches(&rule, &sample_event()));

        let mut cond = condition("message", ConditionModifier::Regex, "^failed");
        cond.case_insensitive = true;
        assert!(matches(&make_rule(vec![cond]), &sample_event()));
    }

    #[test]
    fn invalid_regex_fails_compile() {
        let rule = make_rule(vec![condition("message", ConditionModifier::Regex, "[unclosed")]);
        let err = RuleMatcher::compile(&rule).err().unwrap();
        assert!(matches!(err, EngineError::RuleValidation { .. }));
    }

    #[test]
    fn metadata_fields_are_matchable() {
        let event = sample_event();
        let rule = make_rule(vec![condition("ip", ConditionModifier::Exact, "192.168.1.100")]);
        assert!(matches(&rule, &event));
        let rule = make_rule(vec![condition("userId", ConditionModifier::Exact, "root")]);
        assert!(matches(&rule, &event));
        let rule = make_rule(vec![condition("port", ConditionModifier::Exact, "22")]);
        assert!(matches(&rule, &event));
        let rule = make_rule(vec![condition("level", ConditionModifier::Exact, "ERROR")]);
        assert!(matches(&rule, &event));
    }

    #[test]
    fn missing_field_does_not_match() {
        let rule = make_rule(vec![condition("deviceId", ConditionModifier::Exact, "x")]);
        assert!(!matches(&rule, &sample_event()));
    }

    #[test]
    fn and_logic_requires_all_conditions() {
        let rule = make_rule(vec![
            condition("source", ConditionModifier::Exact, "sshd"),
            condition("message", ConditionModifier::Contains, "Accepted"),
        ]);
        assert!(!matches(&rule, &sample_event()));
    }

    #[test]
    fn declarative_rule_without_threshold_fires_on_any_match() {
        let rule = DeclarativeRule::compile(make_rule(vec![condition(
            "source",
            ConditionModifier::Exact,
            "sshd",
        )]))
        .unwrap();
        assert!(rule.evaluate(&[sample_event()]).unwrap());
        assert!(!rule.evaluate(&[]).unwrap());
    }

    #[test]
    fn declarative_threshold_is_strictly_greater() {
        let mut definition = make_rule(vec![condition(
            "message",
            ConditionModifier::Contains,
            "Failed password",
        )]);
        definition.threshold = Some(ThresholdConfig {
            group_by: WatchedKey::Ip,
            count: 2,
        });
        let rule = DeclarativeRule::compile(definition).unwrap();

        let two = vec![sample_event(), sample_event()];
        assert!(!rule.evaluate(&two).unwrap());
        let three = vec![sample_event(), sample_event(), sample_event()];
        assert!(rule.evaluate(&three).unwrap());
    }

    #[test]
    fn declarative_rule_uses_title_as_name() {
        let rule = DeclarativeRule::compile(make_rule(vec![condition(
            "source",
            ConditionModifier::Exact,
            "sshd",
        )]))
        .unwrap();
        assert_eq!(rule.id(), "test_rule");
        assert_eq!(rule.name(), "Test");
    }
}
