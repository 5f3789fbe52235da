//! 엔진 에러 타입
//!
//! [`EngineError`]는 정규화, 규칙 로딩, 타임라인 조립 중 발생하는 모든 에러를 표현합니다.
//! `From<EngineError> for TimelineError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use incident_timeline_core::error::{ConfigError, RuleError, TimelineError};

/// 타임라인 엔진 도메인 에러
///
/// 입력 파일 접근, JSON 파싱, 한도 초과, 규칙 로딩 등
/// 엔진 내부의 모든 에러 상황을 포괄합니다. 모두 치명적이며 부분 결과는 반환되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 입력 파일이 존재하지 않음
    #[error("input not found: {path}")]
    InputNotFound {
        /// 입력 경로
        path: String,
    },

    /// 입력 파일을 열거나 읽을 수 없음
    #[error("input unreadable: {path}: {reason}")]
    InputUnreadable {
        /// 입력 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// JSON 입력이 형식에 맞지 않음
    #[error("malformed json: {path} at offset {offset}: {reason}")]
    MalformedJson {
        /// 입력 경로
        path: String,
        /// 실패 위치 (바이트 오프셋)
        offset: u64,
        /// 실패 사유
        reason: String,
    },

    /// 같은 배치에서 이벤트 ID가 중복됨
    #[error("duplicate event id '{id}' in {path}")]
    DuplicateEventId {
        /// 입력 경로
        path: String,
        /// 중복된 ID
        id: String,
    },

    /// 이벤트 수 한도 초과
    #[error("too many events in {path}: limit is {max}")]
    TooManyEvents {
        /// 입력 경로
        path: String,
        /// 최대 이벤트 수
        max: usize,
    },

    /// 입력 읽기 제한 시간 초과
    #[error("read timeout after {secs}s: {path}")]
    ReadTimeout {
        /// 입력 경로
        path: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl EngineError {
    /// 입력 파일 관련 에러 여부 (CLI 종료 코드 분류용)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. }
                | Self::InputUnreadable { .. }
                | Self::MalformedJson { .. }
                | Self::DuplicateEventId { .. }
                | Self::TooManyEvents { .. }
                | Self::ReadTimeout { .. }
        )
    }
}

impl From<EngineError> for TimelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Io(e) => TimelineError::Io(e),
            EngineError::Config { field, reason } => {
                TimelineError::Config(ConfigError::InvalidValue { field, reason })
            }
            EngineError::RuleValidation { rule_id, reason } => {
                TimelineError::Rule(RuleError::Invalid { rule_id, reason })
            }
            other => TimelineError::Ingest(other.to_string()),
        }
    }
}
