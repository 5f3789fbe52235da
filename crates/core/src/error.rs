//! 에러 타입 -- 도메인별 에러 정의

/// Incident Timeline 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 탐지 규칙 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 수집/정규화 단계 에러 (입력 파일, 파싱, 한도 초과 등)
    #[error("ingest error: {0}")]
    Ingest(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 탐지 규칙 에러
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 규칙 평가 중 실패
    #[error("rule '{rule_id}' failed to evaluate: {reason}")]
    Evaluation { rule_id: String, reason: String },

    /// 규칙 정의가 유효하지 않음
    #[error("rule '{rule_id}' is invalid: {reason}")]
    Invalid { rule_id: String, reason: String },
}
