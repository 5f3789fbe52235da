//! JSON 배열 리더
//!
//! 최상위 JSON 배열을 바이트 단위로 스캔하여 원소를 하나씩 [`Event`]로 디코딩합니다.
//! 전체 문서를 메모리에 올리지 않으며, 한 번에 원소 하나만 버퍼링합니다.
//!
//! # 형식 규칙
//! - 최상위는 배열이어야 합니다. 빈 파일(공백만 있는 경우 포함)은 이벤트 0개입니다.
//! - 각 원소는 비어있지 않은 `id`를 가진 이벤트 객체여야 하며, `id`는 파일 내에서 유일합니다.
//! - 후행 쉼표, 배열 뒤의 잔여 데이터, 중간 EOF는 모두 `MalformedJson`입니다.
//!
//! # 사용 예시
//! ```ignore
//! use std::io::Cursor;
//! use incident_timeline_engine::normalizer::JsonArrayReader;
//!
//! let input = br#"[{"id":"a","timestamp":"2023-01-01T10:00:00Z"}]"#;
//! let reader = JsonArrayReader::new(Cursor::new(&input[..]), "inline", 1024 * 1024);
//! for event in reader {
//!     println!("{}", event?.id);
//! }
//! ```

use std::collections::HashSet;
use std::io::BufRead;

use incident_timeline_core::types::Event;

use crate::error::EngineError;

/// 리더 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// `[` 이전
    Start,
    /// `[` 직후 (첫 원소 또는 `]` 대기)
    Open,
    /// 원소 직후 (`,` 또는 `]` 대기)
    AfterElement,
    /// `]` 이후 (EOF 대기)
    Closed,
    /// 정상 종료
    Done,
    /// 에러 이후 -- 항상 `None`
    Failed,
}

/// 증분 JSON 배열 리더
///
/// `Iterator<Item = Result<Event, EngineError>>`를 구현하며,
/// 첫 에러 이후에는 `None`만 반환합니다.
pub struct JsonArrayReader<R> {
    reader: R,
    path: String,
    /// 현재 바이트 오프셋
    offset: u64,
    max_element_bytes: usize,
    state: State,
    /// 현재 원소 버퍼
    buf: Vec<u8>,
    seen_ids: HashSet<String>,
}

impl<R: BufRead> JsonArrayReader<R> {
    /// 새 리더를 생성합니다.
    ///
    /// `path`는 에러 메시지에 표시되는 입력 이름입니다.
    pub fn new(reader: R, path: impl Into<String>, max_element_bytes: usize) -> Self {
        Self {
            reader,
            path: path.into(),
            offset: 0,
            max_element_bytes,
            state: State::Start,
            buf: Vec::new(),
            seen_ids: HashSet::new(),
        }
    }

    /// 지금까지 소비한 바이트 수
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn malformed(&self, reason: impl Into<String>) -> EngineError {
        EngineError::MalformedJson {
            path: self.path.clone(),
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, EngineError> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(EngineError::InputUnreadable {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn skip_whitespace(&mut self) -> Result<(), EngineError> {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek()? {
            self.bump();
        }
        Ok(())
    }

    /// 현재 바이트를 원소 버퍼로 옮깁니다.
    fn take(&mut self, byte: u8) -> Result<(), EngineError> {
        if self.buf.len() >= self.max_element_bytes {
            return Err(self.malformed(format!(
                "array element exceeds {} bytes",
                self.max_element_bytes
            )));
        }
        self.buf.push(byte);
        self.bump();
        Ok(())
    }

    fn unexpected_eof(&self) -> EngineError {
        self.malformed("unexpected end of input inside array")
    }

    /// `{...}` 또는 `[...]` 원소를 스캔합니다.
    fn scan_composite(&mut self) -> Result<(), EngineError> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let byte = self.peek()?.ok_or_else(|| self.unexpected_eof())?;
            self.take(byte)?;

            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// 문자열 원소를 스캔합니다 (여는 따옴표 위치에서 시작).
    fn scan_string(&mut self) -> Result<(), EngineError> {
        let mut escaped = false;
        self.take(b'"')?;
        loop {
            let byte = self.peek()?.ok_or_else(|| self.unexpected_eof())?;
            self.take(byte)?;
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                return Ok(());
            }
        }
    }

    /// 숫자/리터럴 원소를 스캔합니다. 구분자는 소비하지 않습니다.
    fn scan_scalar(&mut self) -> Result<(), EngineError> {
        while let Some(byte) = self.peek()? {
            if matches!(byte, b',' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.take(byte)?;
        }
        Ok(())
    }

    /// 다음 원소를 읽어 이벤트로 디코딩합니다.
    fn read_element(&mut self) -> Result<Event, EngineError> {
        self.state = State::AfterElement;
        self.buf.clear();
        let start = self.offset;

        match self.peek()? {
            Some(b'{' | b'[') => self.scan_composite()?,
            Some(b'"') => self.scan_string()?,
            Some(_) => self.scan_scalar()?,
            None => return Err(self.unexpected_eof()),
        }

        let event: Event =
            serde_json::from_slice(&self.buf).map_err(|e| EngineError::MalformedJson {
                path: self.path.clone(),
                offset: start,
                reason: format!("array element is not a valid event: {e}"),
            })?;

        if event.id.trim().is_empty() {
            return Err(EngineError::MalformedJson {
                path: self.path.clone(),
                offset: start,
                reason: "event id must not be empty".to_owned(),
            });
        }

        if !self.seen_ids.insert(event.id.clone()) {
            return Err(EngineError::DuplicateEventId {
                path: self.path.clone(),
                id: event.id,
            });
        }

        Ok(event)
    }

    fn advance(&mut self) -> Result<Option<Event>, EngineError> {
        loop {
            match self.state {
                State::Start => {
                    self.skip_whitespace()?;
                    match self.peek()? {
                        None => {
                            self.state = State::Done;
                            return Ok(None);
                        }
                        Some(b'[') => {
                            self.bump();
                            self.state = State::Open;
                        }
                        Some(byte) => {
                            return Err(self.malformed(format!(
                                "top level must be an array, found {}",
                                describe(byte)
                            )));
                        }
                    }
                }
                State::Open => {
                    self.skip_whitespace()?;
                    match self.peek()? {
                        Some(b']') => {
                            self.bump();
                            self.state = State::Closed;
                        }
                        Some(_) => return self.read_element().map(Some),
                        None => return Err(self.unexpected_eof()),
                    }
                }
                State::AfterElement => {
                    self.skip_whitespace()?;
                    match self.peek()? {
                        Some(b',') => {
                            self.bump();
                            self.skip_whitespace()?;
                            match self.peek()? {
                                Some(b']') => return Err(self.malformed("trailing comma in array")),
                                Some(_) => return self.read_element().map(Some),
                                None => return Err(self.unexpected_eof()),
                            }
                        }
                        Some(b']') => {
                            self.bump();
                            self.state = State::Closed;
                        }
                        Some(byte) => {
                            return Err(self.malformed(format!(
                                "expected ',' or ']' after array element, found {}",
                                describe(byte)
                            )));
                        }
                        None => return Err(self.unexpected_eof()),
                    }
                }
                State::Closed => {
                    self.skip_whitespace()?;
                    return match self.peek()? {
                        None => {
                            self.state = State::Done;
                            Ok(None)
                        }
                        Some(byte) => Err(self.malformed(format!(
                            "unexpected {} after the top-level array",
                            describe(byte)
                        ))),
                    };
                }
                State::Done | State::Failed => return Ok(None),
            }
        }
    }
}

impl<R: BufRead> Iterator for JsonArrayReader<R> {
    type Item = Result<Event, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Failed;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for JsonArrayReader<R> {}

fn describe(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", byte as char)
    } else {
        format!("byte 0x{byte:02x}")
    }
}
