//! 설정 관리 -- incident-timeline.toml 파싱 및 런타임 설정
//!
//! [`TimelineConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`INCIDENT_TIMELINE_INGEST_MAX_EVENTS=1000` 형식)
//! 3. 설정 파일 (`incident-timeline.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), incident_timeline_core::error::TimelineError> {
//! use incident_timeline_core::config::TimelineConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TimelineConfig::load("incident-timeline.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TimelineConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TimelineError};

/// 기본 설정 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "incident-timeline.toml";

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "INCIDENT_TIMELINE";

/// 입력 읽기 제한 시간의 상한 (초, 24시간)
pub const MAX_READ_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Incident Timeline 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집/정규화 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 탐지 규칙 설정
    #[serde(default)]
    pub rules: RulesConfig,
}

impl TimelineConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TimelineError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 기본값에 환경변수 오버라이드만 적용합니다 (설정 파일 없이 실행할 때).
    pub fn from_env() -> Result<Self, TimelineError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TimelineError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TimelineError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TimelineError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TimelineError> {
        toml::from_str(toml_str).map_err(|e| {
            TimelineError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `INCIDENT_TIMELINE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(
            &mut self.general.log_level,
            "INCIDENT_TIMELINE_GENERAL_LOG_LEVEL",
        );
        override_string(
            &mut self.general.log_format,
            "INCIDENT_TIMELINE_GENERAL_LOG_FORMAT",
        );

        // Ingest
        override_usize(
            &mut self.ingest.max_events,
            "INCIDENT_TIMELINE_INGEST_MAX_EVENTS",
        );
        override_usize(
            &mut self.ingest.max_element_bytes,
            "INCIDENT_TIMELINE_INGEST_MAX_ELEMENT_BYTES",
        );
        override_usize(
            &mut self.ingest.max_line_bytes,
            "INCIDENT_TIMELINE_INGEST_MAX_LINE_BYTES",
        );
        override_u64(
            &mut self.ingest.read_timeout_secs,
            "INCIDENT_TIMELINE_INGEST_READ_TIMEOUT_SECS",
        );

        // Rules
        override_bool(&mut self.rules.builtin, "INCIDENT_TIMELINE_RULES_BUILTIN");
        override_usize(
            &mut self.rules.brute_force_threshold,
            "INCIDENT_TIMELINE_RULES_BRUTE_FORCE_THRESHOLD",
        );
        override_string(
            &mut self.rules.rules_dir,
            "INCIDENT_TIMELINE_RULES_RULES_DIR",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TimelineError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.ingest.max_events == 0 {
            return Err(invalid("ingest.max_events", "must be greater than 0"));
        }
        if self.ingest.max_element_bytes < 64 {
            return Err(invalid(
                "ingest.max_element_bytes",
                "must be at least 64 bytes",
            ));
        }
        if self.ingest.max_line_bytes < 64 {
            return Err(invalid("ingest.max_line_bytes", "must be at least 64 bytes"));
        }
        if self.ingest.read_timeout_secs == 0 {
            return Err(invalid(
                "ingest.read_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.ingest.read_timeout_secs > MAX_READ_TIMEOUT_SECS {
            return Err(invalid(
                "ingest.read_timeout_secs",
                format!("must be at most {MAX_READ_TIMEOUT_SECS}"),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TimelineError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 수집/정규화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 한 번의 빌드에서 허용하는 최대 이벤트 수
    pub max_events: usize,
    /// JSON 배열 원소 하나의 최대 크기 (바이트)
    pub max_element_bytes: usize,
    /// 텍스트 로그 한 줄의 최대 크기 (바이트, 초과분은 잘림)
    pub max_line_bytes: usize,
    /// 입력 읽기 제한 시간 (초)
    pub read_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_element_bytes: 1024 * 1024, // 1MB
            max_line_bytes: 64 * 1024,      // 64KB
            read_timeout_secs: 60,
        }
    }
}

/// 탐지 규칙 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 내장 규칙 활성화 여부
    pub builtin: bool,
    /// 브루트포스 규칙 임계값 (이 값을 초과하면 발동)
    pub brute_force_threshold: usize,
    /// YAML 규칙 디렉토리 (빈 문자열 = 사용 안 함)
    pub rules_dir: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            brute_force_threshold: 3,
            rules_dir: String::new(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
