//! 엔진 설정
//!
//! [`AssemblerConfig`]는 core의 [`TimelineConfig`](incident_timeline_core::config::TimelineConfig)
//! 중 `ingest`/`rules` 섹션을 기반으로 타임라인 조립에 필요한 값을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use incident_timeline_core::config::{MAX_READ_TIMEOUT_SECS, TimelineConfig};
//! use incident_timeline_engine::config::AssemblerConfig;
//!
//! let core_config = TimelineConfig::default();
//! let config = AssemblerConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use incident_timeline_core::config::{MAX_READ_TIMEOUT_SECS, TimelineConfig};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// 타임라인 조립 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// 한 번의 빌드에서 허용하는 최대 이벤트 수
    pub max_events: usize,
    /// JSON 배열 원소 하나의 최대 크기 (바이트)
    pub max_element_bytes: usize,
    /// 텍스트 로그 한 줄의 최대 크기 (바이트)
    pub max_line_bytes: usize,
    /// 입력 읽기 제한 시간 (초)
    pub read_timeout_secs: u64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_element_bytes: 1024 * 1024,
            max_line_bytes: 64 * 1024,
            read_timeout_secs: 60,
        }
    }
}

impl AssemblerConfig {
    /// core 설정에서 조립 설정을 생성합니다.
    pub fn from_core(core: &TimelineConfig) -> Self {
        Self {
            max_events: core.ingest.max_events,
            max_element_bytes: core.ingest.max_element_bytes,
            max_line_bytes: core.ingest.max_line_bytes,
            read_timeout_secs: core.ingest.read_timeout_secs,
        }
    }

    /// 읽기 제한 시간
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_events == 0 {
            return Err(EngineError::Config {
                field: "max_events".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_element_bytes == 0 || self.max_line_bytes == 0 {
            return Err(EngineError::Config {
                field: "max_element_bytes/max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.read_timeout_secs == 0 {
            return Err(EngineError::Config {
                field: "read_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.read_timeout_secs > MAX_READ_TIMEOUT_SECS {
            return Err(EngineError::Config {
                field: "read_timeout_secs".to_owned(),
                reason: format!("must be at most {MAX_READ_TIMEOUT_SECS}"),
            });
        }

        Ok(())
    }
}
