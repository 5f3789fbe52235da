//! 로그 정규화 모듈 -- JSON 배열, 자유 형식 텍스트 로그
//!
//! [`Normalizer`]는 파일 확장자로 방언([`Dialect`])을 한 번 결정하고,
//! 파일을 [`Event`] 스트림으로 변환합니다.
//!
//! # 지원 방언
//! - JSON 배열 (`*.json`, [`JsonArrayReader`]): 엄격. 형식 오류는 치명적입니다.
//! - 자유 형식 텍스트 (그 외, [`TextLineReader`]): 관대. 줄 단위로 항상 이벤트를 생성합니다.
//!
//! # 사용 예시
//! ```ignore
//! use incident_timeline_engine::normalizer::Normalizer;
//!
//! let normalizer = Normalizer::default();
//! for event in normalizer.open("auth.log")? {
//!     println!("{}", event?);
//! }
//! ```

pub mod json;
pub mod text;

pub use json::JsonArrayReader;
pub use text::{TextLineParser, TextLineReader};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use incident_timeline_core::types::Event;
use tracing::debug;

use crate::config::AssemblerConfig;
use crate::error::EngineError;

/// 입력 방언
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// 이벤트 객체의 JSON 배열
    Json,
    /// 한 줄에 하나의 로그
    Text,
}

impl Dialect {
    /// 경로의 확장자로 방언을 선택합니다. `.json` (대소문자 무시)만 JSON입니다.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }

    /// 방언 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// 로그 정규화기
///
/// 원소/줄 크기 한도만 보관하며, 파일마다 새 [`EventStream`]을 엽니다.
#[derive(Debug, Clone)]
pub struct Normalizer {
    max_element_bytes: usize,
    max_line_bytes: usize,
}

impl Normalizer {
    /// 크기 한도를 지정하여 정규화기를 생성합니다.
    pub fn new(max_element_bytes: usize, max_line_bytes: usize) -> Self {
        Self {
            max_element_bytes,
            max_line_bytes,
        }
    }

    /// 조립 설정에서 정규화기를 생성합니다.
    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(config.max_element_bytes, config.max_line_bytes)
    }

    /// 파일을 열어 이벤트 스트림을 반환합니다.
    ///
    /// 파일이 없으면 `InputNotFound`, 그 외 열기 실패는 `InputUnreadable`입니다.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<EventStream, EngineError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::InputNotFound {
                    path: label.clone(),
                }
            } else {
                EngineError::InputUnreadable {
                    path: label.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let dialect = Dialect::from_path(path);
        debug!(path = %label, dialect = dialect.as_str(), "opened log input");

        self.stream(dialect, label, BufReader::new(file))
    }

    /// 임의의 리더에서 이벤트 스트림을 생성합니다.
    ///
    /// `label`은 에러 메시지에 표시되는 입력 이름입니다.
    pub fn stream(
        &self,
        dialect: Dialect,
        label: impl Into<String>,
        reader: impl BufRead + Send + 'static,
    ) -> Result<EventStream, EngineError> {
        let reader: Box<dyn BufRead + Send> = Box::new(reader);
        let inner = match dialect {
            Dialect::Json => {
                StreamInner::Json(JsonArrayReader::new(reader, label, self.max_element_bytes))
            }
            Dialect::Text => StreamInner::Text(TextLineReader::new(
                reader,
                label,
                self.max_line_bytes,
                TextLineParser::new()?,
            )),
        };
        Ok(EventStream { dialect, inner })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&AssemblerConfig::default())
    }
}

enum StreamInner {
    Json(JsonArrayReader<Box<dyn BufRead + Send>>),
    Text(TextLineReader<Box<dyn BufRead + Send>>),
}

/// 지연 평가되는 이벤트 스트림
///
/// 유한하며 다시 시작할 수 없습니다. 에러를 한 번 반환한 뒤에는 항상 `None`을 반환합니다.
pub struct EventStream {
    dialect: Dialect,
    inner: StreamInner,
}

impl EventStream {
    /// 이 스트림의 방언
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl Iterator for EventStream {
    type Item = Result<Event, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            StreamInner::Json(reader) => reader.next(),
            StreamInner::Text(reader) => reader.next(),
        }
    }
}

impl std::iter::FusedIterator for EventStream {}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}
