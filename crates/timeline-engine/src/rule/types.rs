//! 선언형 탐지 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.

use incident_timeline_core::types::WatchedKey;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// 탐지 규칙 -- 하나의 YAML 규칙 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// id: ssh_brute_force
/// title: SSH Brute Force Attempt
/// description: More than 5 failed SSH logins from one address
/// status: enabled
/// conditions:
///   - field: source
///     value: sshd
///   - field: message
///     modifier: contains
///     value: "failed password"
///     case_insensitive: true
/// threshold:
///   group_by: ip
///   count: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRule {
    /// 규칙 고유 ID (규칙 집합 내에서 유일해야 함)
    pub id: String,
    /// 규칙 제목 (finding 문자열에 표시)
    pub title: String,
    /// 규칙 설명
    #[serde(default)]
    pub description: String,
    /// 규칙 상태
    #[serde(default)]
    pub status: RuleStatus,
    /// 이벤트 매칭 조건 (AND 결합)
    #[serde(default)]
    pub conditions: Vec<FieldCondition>,
    /// 그룹별 집계 임계값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdConfig>,
}

impl DetectionRule {
    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.is_empty() {
            return Err(EngineError::RuleValidation {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.id.len() > 256 {
            return Err(EngineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule id must not exceed 256 characters".to_owned(),
            });
        }

        if self.title.is_empty() {
            return Err(EngineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule title must not be empty".to_owned(),
            });
        }

        if self.conditions.is_empty() {
            return Err(EngineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "at least one condition is required".to_owned(),
            });
        }

        for (idx, condition) in self.conditions.iter().enumerate() {
            if condition.field.is_empty() {
                return Err(EngineError::RuleValidation {
                    rule_id: self.id.clone(),
                    reason: format!("condition[{idx}] field must not be empty"),
                });
            }
        }

        if let Some(ref threshold) = self.threshold {
            if threshold.count == 0 {
                return Err(EngineError::RuleValidation {
                    rule_id: self.id.clone(),
                    reason: "threshold count must be greater than 0".to_owned(),
                });
            }
        }

        Ok(())
    }

    /// 활성화 여부
    pub fn is_enabled(&self) -> bool {
        self.status == RuleStatus::Enabled
    }
}

/// 규칙 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// 활성화 (기본값)
    #[default]
    Enabled,
    /// 비활성화 -- 로드되지만 규칙 집합에 등록되지 않음
    Disabled,
}

/// 필드 매칭 조건
///
/// 하나의 이벤트 필드에 대한 매칭 조건을 나타냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCondition {
    /// 대상 필드명 (message, source, level, id, 감시 키, 또는 추가 메타데이터 키)
    pub field: String,
    /// 매칭 수정자
    #[serde(default)]
    pub modifier: ConditionModifier,
    /// 매칭할 값
    pub value: String,
    /// 대소문자 무시 여부
    #[serde(default)]
    pub case_insensitive: bool,
}

/// 조건 수정자 -- 매칭 방식을 결정합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionModifier {
    /// 정확히 일치
    #[default]
    Exact,
    /// 부분 문자열 포함
    Contains,
    /// 접두사 일치
    StartsWith,
    /// 접미사 일치
    EndsWith,
    /// 정규식 매칭
    Regex,
}

/// 임계값 설정
///
/// 조건에 매칭된 이벤트를 `group_by` 키 값으로 묶고,
/// 어느 그룹이든 `count`를 초과하면 규칙이 발동합니다.
/// 예: 같은 IP에서 로그인 실패가 3회를 초과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// 그룹화 키 (ip, userId, deviceId, sessionId)
    pub group_by: WatchedKey,
    /// 임계값 (이 값을 초과해야 발동)
    pub count: usize,
}
