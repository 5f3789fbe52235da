#![no_main]

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use incident_timeline_core::types::{Event, EventMetadata, Level, WatchedKey};
use incident_timeline_engine::rule::matcher::RuleMatcher;
use incident_timeline_engine::rule::types::{
    ConditionModifier, DetectionRule, FieldCondition, RuleStatus,
};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 조건 목록 (최대 8개로 제한)
    conditions: Vec<FuzzCondition>,
    /// 매칭 대상 Event 필드값
    event_message: String,
    event_source: String,
    event_ip: Option<String>,
}

#[derive(Arbitrary, Debug)]
struct FuzzCondition {
    field: FuzzField,
    modifier: FuzzModifier,
    value: String,
    case_insensitive: bool,
}

#[derive(Arbitrary, Debug)]
enum FuzzField {
    Message,
    Source,
    Level,
    Ip,
    Other,
}

#[derive(Arbitrary, Debug)]
enum FuzzModifier {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

impl FuzzField {
    fn as_str(&self) -> &str {
        match self {
            FuzzField::Message => "message",
            FuzzField::Source => "source",
            FuzzField::Level => "level",
            FuzzField::Ip => "ip",
            FuzzField::Other => "hostname",
        }
    }
}

impl FuzzModifier {
    fn to_condition_modifier(&self) -> ConditionModifier {
        match self {
            FuzzModifier::Exact => ConditionModifier::Exact,
            FuzzModifier::Contains => ConditionModifier::Contains,
            FuzzModifier::StartsWith => ConditionModifier::StartsWith,
            FuzzModifier::EndsWith => ConditionModifier::EndsWith,
            FuzzModifier::Regex => ConditionModifier::Regex,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let conditions: Vec<FieldCondition> = input
        .conditions
        .iter()
        .take(8)
        .map(|c| FieldCondition {
            field: c.field.as_str().to_owned(),
            modifier: c.modifier.to_condition_modifier(),
            value: c.value.clone(),
            case_insensitive: c.case_insensitive,
        })
        .collect();

    if conditions.is_empty() {
        return;
    }

    let rule = DetectionRule {
        id: "fuzz_rule".to_owned(),
        title: "Fuzz Rule".to_owned(),
        description: String::new(),
        status: RuleStatus::Enabled,
        conditions,
        threshold: None,
    };

    // 컴파일 실패(잘못된 정규식 등)는 크래시가 아님
    let Ok(matcher) = RuleMatcher::compile(&rule) else {
        return;
    };

    let mut metadata = EventMetadata::default();
    if let Some(ip) = input.event_ip {
        metadata.set(WatchedKey::Ip, ip);
    }
    let Some(timestamp) = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).single() else {
        return;
    };
    let event = Event::new(
        "fuzz-1",
        timestamp,
        Level::Info,
        input.event_source,
        input.event_message,
    )
    .with_metadata(metadata);

    // matches도 크래시 없이 Ok/Err 반환해야 함
    let _ = matcher.matches(&rule, &event);
});
