//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 정규화된 로그 이벤트와 상관 분석 결과(타임라인)를 정의합니다.
//! 각 크레이트는 이 타입들을 사용하여 데이터를 교환합니다.
//!
//! # 직렬화 형식
//! JSON 필드 이름은 외부 소비자와의 호환을 위해 camelCase를 사용합니다
//! (`relatedEvents`, `startTime`, `userId` 등).

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 심각도 태그 -- 치명적 레벨 이벤트에 부여됩니다.
pub const CRITICAL_TAG: &str = "CRITICAL";

/// 클러스터 태그 접두사 (`Cluster:<index>`)
pub const CLUSTER_TAG_PREFIX: &str = "Cluster:";

/// 빈 타임라인 센티넬 제목
pub const EMPTY_TIMELINE_TITLE: &str = "Empty Timeline";

/// summary 문자열에서 규칙 발동을 알리는 표식
pub const FINDINGS_MARKER: &str = "Findings: ";

/// JSON 입력에서 `source`가 생략된 경우의 기본값
pub const DEFAULT_JSON_SOURCE: &str = "json-log";

/// 로그 레벨
///
/// `Ord` 구현으로 레벨 비교가 가능합니다
/// (`Debug < Info < Warn < Error < Critical < Fatal`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// 디버그
    Debug,
    /// 정보성 (기본값)
    #[default]
    Info,
    /// 경고
    Warn,
    /// 에러
    Error,
    /// 치명적
    Critical,
    /// 치명적 -- 프로세스 중단 수준
    Fatal,
}

impl Level {
    /// 문자열에서 레벨을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, 흔한 별칭(`warning`, `err`, `crit`)을 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(Self::Debug),
            "info" | "information" | "notice" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            "critical" | "crit" => Some(Self::Critical),
            "fatal" | "panic" | "emerg" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// 직렬화에 사용되는 대문자 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Fatal => "FATAL",
        }
    }

    /// `ERROR` 이상이면 true
    pub fn is_critical(self) -> bool {
        self >= Self::Error
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_str_loose(&raw)
            .ok_or_else(|| D::Error::custom(format!("unknown log level '{raw}'")))
    }
}

/// 상관 분석에 참여하는 메타데이터 키
///
/// 이 네 키만 엔티티 그래프의 간선을 만듭니다.
/// 그 외 메타데이터는 [`EventMetadata::extra`]에 보관되며 상관 분석에서 무시됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WatchedKey {
    /// IP 주소
    #[serde(rename = "ip")]
    Ip,
    /// 사용자 ID
    #[serde(rename = "userId")]
    UserId,
    /// 디바이스 ID
    #[serde(rename = "deviceId")]
    DeviceId,
    /// 세션 ID
    #[serde(rename = "sessionId")]
    SessionId,
}

impl WatchedKey {
    /// 모든 감시 키 (고정 순서)
    pub const ALL: [WatchedKey; 4] = [
        WatchedKey::Ip,
        WatchedKey::UserId,
        WatchedKey::DeviceId,
        WatchedKey::SessionId,
    ];

    /// 와이어 형식 키 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::UserId => "userId",
            Self::DeviceId => "deviceId",
            Self::SessionId => "sessionId",
        }
    }

    /// 키 이름을 파싱합니다. camelCase와 snake_case를 모두 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "ip" => Some(Self::Ip),
            "userId" | "user_id" => Some(Self::UserId),
            "deviceId" | "device_id" => Some(Self::DeviceId),
            "sessionId" | "session_id" => Some(Self::SessionId),
            _ => None,
        }
    }
}

impl fmt::Display for WatchedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 메타데이터
///
/// 감시 키는 닫힌 필드로, 나머지는 `extra`로 분리합니다.
/// 직렬화 시에는 평탄한 key-value 객체가 됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// IP 주소
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub ip: Option<String>,
    /// 사용자 ID
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub user_id: Option<String>,
    /// 디바이스 ID
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub device_id: Option<String>,
    /// 세션 ID
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub session_id: Option<String>,
    /// 상관 분석에 참여하지 않는 추가 속성
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// 감시 키의 값을 반환합니다.
    pub fn get(&self, key: WatchedKey) -> Option<&str> {
        match key {
            WatchedKey::Ip => self.ip.as_deref(),
            WatchedKey::UserId => self.user_id.as_deref(),
            WatchedKey::DeviceId => self.device_id.as_deref(),
            WatchedKey::SessionId => self.session_id.as_deref(),
        }
    }

    /// 감시 키의 값을 설정합니다.
    pub fn set(&mut self, key: WatchedKey, value: impl Into<String>) {
        let slot = match key {
            WatchedKey::Ip => &mut self.ip,
            WatchedKey::UserId => &mut self.user_id,
            WatchedKey::DeviceId => &mut self.device_id,
            WatchedKey::SessionId => &mut self.session_id,
        };
        *slot = Some(value.into());
    }

    /// 감시 키를 설정한 메타데이터를 반환합니다 (빌더 스타일).
    pub fn with(mut self, key: WatchedKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// 값이 있는 감시 키를 고정 순서로 순회합니다.
    pub fn watched(&self) -> impl Iterator<Item = (WatchedKey, &str)> + '_ {
        WatchedKey::ALL
            .into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }

    /// 이름으로 메타데이터 값을 조회합니다.
    ///
    /// 감시 키를 먼저 확인하고, 없으면 `extra`의 스칼라 값을 문자열로 반환합니다.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        if let Some(key) = WatchedKey::from_str_loose(name) {
            return self.get(key).map(Cow::Borrowed);
        }
        match self.extra.get(name)? {
            serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
            serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    /// 감시 키와 추가 속성이 모두 비어있으면 true
    pub fn is_empty(&self) -> bool {
        self.watched().next().is_none() && self.extra.is_empty()
    }
}

/// 감시 키 값을 문자열로 역직렬화합니다.
///
/// 숫자와 불리언은 문자열로 변환하고, 객체/배열은 거부합니다.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number for a correlation key, got {other}"
        ))),
    }
}

/// `null` 메타데이터를 빈 메타데이터로 취급합니다.
fn nullable_metadata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventMetadata, D::Error> {
    Option::<EventMetadata>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn default_json_source() -> String {
    DEFAULT_JSON_SOURCE.to_owned()
}

/// 정규화된 로그 이벤트
///
/// 생성 후 변경되지 않습니다. `id`는 한 번의 수집 배치 내에서 유일합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 고유 ID
    pub id: String,
    /// 발생 시각
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// 로그 레벨
    #[serde(default)]
    pub level: Level,
    /// 원본 소스 식별자
    #[serde(default = "default_json_source")]
    pub source: String,
    /// 로그 메시지
    #[serde(default)]
    pub message: String,
    /// 메타데이터
    #[serde(default, deserialize_with = "nullable_metadata")]
    pub metadata: EventMetadata,
}

impl Event {
    /// 메타데이터 없이 새 이벤트를 생성합니다.
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        level: Level,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            level,
            source: source.into(),
            message: message.into(),
            metadata: EventMetadata::default(),
        }
    }

    /// 메타데이터를 설정한 이벤트를 반환합니다.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            timestamp::format(&self.timestamp),
            self.level,
            self.source,
            self.message,
        )
    }
}

/// 엔티티 -- 하나의 감시 키/값 쌍 (`"<key>:<value>"`)
///
/// 그래프 노드로만 존재하며 독립적으로 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    /// 감시 키
    pub key: WatchedKey,
    /// 값
    pub value: String,
}

impl Entity {
    pub fn new(key: WatchedKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 타임라인 이벤트 -- 상관 분석 결과가 덧붙은 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// 원본 이벤트
    #[serde(flatten)]
    pub event: Event,
    /// 같은 클러스터에 속한 다른 이벤트 ID
    #[serde(default)]
    pub related_events: Vec<String>,
    /// 클러스터/심각도 태그
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TimelineEvent {
    /// 태그 보유 여부
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// `Cluster:<index>` 태그에서 클러스터 인덱스를 추출합니다.
    pub fn cluster(&self) -> Option<usize> {
        self.tags
            .iter()
            .find_map(|t| t.strip_prefix(CLUSTER_TAG_PREFIX)?.parse().ok())
    }
}

/// 규칙 발동 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 발동한 규칙 ID
    pub rule_id: String,
    /// 규칙 이름
    pub rule_name: String,
    /// 규칙 설명
    pub description: String,
}

impl Finding {
    /// 사람이 읽는 finding 문자열
    pub fn message(&self) -> String {
        format!("Rule Triggered: {} - {}", self.rule_name, self.description)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// 포렌식 타임라인
///
/// 이벤트는 타임스탬프 오름차순입니다. `startTime`/`endTime`은
/// 첫/마지막 이벤트의 타임스탬프이며, 빈 타임라인에서는 빈 문자열입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// 타임라인 ID
    pub id: String,
    /// 제목
    pub title: String,
    /// 시작 시각
    pub start_time: String,
    /// 종료 시각
    pub end_time: String,
    /// 정렬된 타임라인 이벤트
    pub events: Vec<TimelineEvent>,
    /// 템플릿 요약 문자열
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// 규칙 finding 목록 (등록 순서)
    #[serde(default)]
    pub findings: Vec<String>,
}

impl Timeline {
    /// 빈 타임라인 센티넬을 생성합니다.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: EMPTY_TIMELINE_TITLE.to_owned(),
            start_time: String::new(),
            end_time: String::new(),
            events: Vec::new(),
            summary: None,
            findings: Vec::new(),
        }
    }

    /// 이벤트가 없으면 true
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 규칙이 하나라도 발동했으면 true
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// 서로 다른 클러스터 수
    pub fn cluster_count(&self) -> usize {
        self.events
            .iter()
            .filter_map(TimelineEvent::cluster)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// 타임스탬프 직렬화/파싱 헬퍼
///
/// 직렬화는 RFC 3339 (`2023-01-01T10:00:00Z`)를 사용합니다.
/// 파싱은 RFC 3339, 오프셋 없는 ISO 8601 (UTC로 간주),
/// Unix timestamp (초/밀리초)를 허용합니다.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// RFC 3339 문자열로 변환합니다.
    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// 타임스탬프 문자열을 파싱합니다.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        // 콜론 없는 오프셋 (`+0900`)
        if let Ok(dt) =
            DateTime::parse_from_str(&raw.replacen(' ', "T", 1), "%Y-%m-%dT%H:%M:%S%.f%z")
        {
            return Some(dt.with_timezone(&Utc));
        }

        // 오프셋 없는 ISO 8601 (날짜와 시간 사이 공백 허용)
        let naive = raw.trim_end_matches(['Z', 'z']).replacen(' ', "T", 1);
        if let Ok(dt) = NaiveDateTime::parse_from_str(&naive, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.and_utc());
        }

        raw.parse::<i64>().ok().and_then(from_unix)
    }

    /// Unix timestamp를 변환합니다 (10자리 초과 = 밀리초).
    pub fn from_unix(value: i64) -> Option<DateTime<Utc>> {
        if value > 9_999_999_999 {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        }
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => {
                parse(&s).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{s}'")))
            }
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(from_unix)
                .ok_or_else(|| D::Error::custom(format!("invalid unix timestamp {n}"))),
            other => Err(D::Error::custom(format!(
                "expected timestamp string or number, got {other}"
            ))),
        }
    }
}
