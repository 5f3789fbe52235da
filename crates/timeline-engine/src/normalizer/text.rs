//! 자유 형식 텍스트 로그 파서
//!
//! 한 줄에서 타임스탬프, 레벨, IPv4 주소, 엔티티 토큰을 최선 노력으로 추출합니다.
//! 어떤 줄도 에러를 만들지 않으며, 추출에 실패한 필드는 기본값으로 대체됩니다.
//!
//! # 추출 규칙
//! - 타임스탬프: ISO 8601 (`2023-01-01T10:00:00Z`, `2023-01-01T19:00:00+09:00`,
//!   `2023-01-01 10:00:00.123`) 또는
//!   syslog (`Jan  5 10:00:00`, 현재 연도 가정). 없으면 현재 시각.
//! - 레벨: `INFO|WARN|WARNING|ERROR|DEBUG|CRITICAL|FATAL` (대소문자 무시, 괄호 허용). 없으면 INFO.
//! - 메시지: 타임스탬프와 레벨을 제거한 나머지에서 앞쪽 구분자(`-`, `:`, `|`, `>`)를 제거.
//! - 메타데이터: 첫 IPv4 토큰 → `ip`, `userId=`/`deviceId=`/`sessionId=` 토큰.
//!
//! # 사용 예시
//! ```ignore
//! use incident_timeline_engine::normalizer::TextLineParser;
//!
//! let parser = TextLineParser::new()?;
//! let event = parser.parse_line("2023-01-01T10:00:00Z ERROR Failed login from 10.0.0.5");
//! assert_eq!(event.message, "Failed login from 10.0.0.5");
//! ```

use std::io::{self, BufRead, Read};
use std::ops::Range;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use incident_timeline_core::types::{Event, EventMetadata, Level, WatchedKey, timestamp};
use regex::Regex;

use crate::error::EngineError;

/// 텍스트 로그 이벤트의 source 값
pub const TEXT_SOURCE: &str = "text-log";

const TIMESTAMP_PATTERN: &str = r"(?P<iso>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)|(?P<syslog>\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2} \d{2}:\d{2}:\d{2})";
const LEVEL_PATTERN: &str = r"(?i)\[?\b(debug|info|warn(?:ing)?|error|critical|fatal)\b\]?";
const IPV4_PATTERN: &str = r"\b\d{1,3}(?:\.\d{1,3}){3}\b";
const ENTITY_PATTERN: &str = r"\b(userId|deviceId|sessionId)=([^\s,;]+)";

/// 텍스트 로그 한 줄 파서
///
/// 정규식은 생성 시 한 번만 컴파일됩니다.
#[derive(Debug, Clone)]
pub struct TextLineParser {
    timestamp: Regex,
    level: Regex,
    ipv4: Regex,
    entity: Regex,
    /// syslog 타임스탬프에 적용할 연도
    year: i32,
}

impl TextLineParser {
    /// 새 파서를 생성합니다. syslog 타임스탬프는 현재 연도로 해석합니다.
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            timestamp: Regex::new(TIMESTAMP_PATTERN)?,
            level: Regex::new(LEVEL_PATTERN)?,
            ipv4: Regex::new(IPV4_PATTERN)?,
            entity: Regex::new(ENTITY_PATTERN)?,
            year: Utc::now().year(),
        })
    }

    /// syslog 타임스탬프 연도를 지정합니다.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    /// 한 줄을 이벤트로 변환합니다. 실패하지 않습니다.
    pub fn parse_line(&self, line: &str) -> Event {
        let line = line.trim_end_matches(['\r', '\n']);

        let (timestamp, rest) = match self.timestamp.captures(line) {
            Some(caps) => {
                let (span, parsed) = if let Some(m) = caps.name("iso") {
                    (m.range(), timestamp::parse(m.as_str()))
                } else if let Some(m) = caps.name("syslog") {
                    (m.range(), self.parse_syslog_timestamp(m.as_str()))
                } else {
                    (0..0, None)
                };
                (parsed.unwrap_or_else(Utc::now), cut(line, span))
            }
            None => (Utc::now(), line.to_owned()),
        };

        let (level, rest) = match self.level.captures(&rest) {
            Some(caps) => {
                let level = caps
                    .get(1)
                    .and_then(|m| Level::from_str_loose(m.as_str()))
                    .unwrap_or_default();
                let span = caps.get(0).map_or(0..0, |m| m.range());
                (level, cut(&rest, span))
            }
            None => (Level::Info, rest),
        };

        let message = rest
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|' | '>'))
            .trim_end()
            .to_owned();

        Event {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            level,
            source: TEXT_SOURCE.to_owned(),
            message,
            metadata: self.extract_metadata(line),
        }
    }

    fn parse_syslog_timestamp(&self, raw: &str) -> Option<DateTime<Utc>> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let with_year = format!("{} {collapsed}", self.year);
        NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc())
    }

    fn extract_metadata(&self, line: &str) -> EventMetadata {
        let mut metadata = EventMetadata::default();

        if let Some(m) = self.ipv4.find(line) {
            metadata.set(WatchedKey::Ip, m.as_str());
        }

        for caps in self.entity.captures_iter(line) {
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if let Some(key) = WatchedKey::from_str_loose(key.as_str()) {
                // 같은 키가 여러 번 나오면 첫 값을 사용
                if metadata.get(key).is_none() {
                    metadata.set(key, value.as_str());
                }
            }
        }

        metadata
    }
}

/// `span`을 제거하고 양쪽을 공백 하나로 잇습니다.
fn cut(s: &str, span: Range<usize>) -> String {
    let before = s[..span.start].trim_end();
    let after = s[span.end..].trim_start();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_owned(),
        (_, true) => before.to_owned(),
        _ => format!("{before} {after}"),
    }
}

/// 줄 단위 텍스트 로그 리더
///
/// 빈 줄(공백만 있는 줄 포함)은 건너뜁니다. 잘못된 UTF-8은 대체 문자로 디코딩하고,
/// `max_line_bytes`를 넘는 줄은 문자 경계에서 잘라냅니다.
pub struct TextLineReader<R> {
    reader: R,
    path: String,
    max_line_bytes: usize,
    parser: TextLineParser,
    line: Vec<u8>,
    done: bool,
}

impl<R: BufRead> TextLineReader<R> {
    /// 새 리더를 생성합니다.
    pub fn new(
        reader: R,
        path: impl Into<String>,
        max_line_bytes: usize,
        parser: TextLineParser,
    ) -> Self {
        Self {
            reader,
            path: path.into(),
            max_line_bytes,
            parser,
            line: Vec::new(),
            done: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, EngineError> {
        loop {
            self.line.clear();
            let read = self.read_bounded_line().map_err(|e| EngineError::InputUnreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
            if read == 0 {
                return Ok(None);
            }

            let decoded = String::from_utf8_lossy(&self.line);
            let line = truncate_on_char_boundary(&decoded, self.max_line_bytes);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.to_owned()));
        }
    }
}

impl<R: BufRead> TextLineReader<R> {
    /// 최대 `max_line_bytes`만 버퍼에 담고, 초과분은 다음 줄바꿈까지 버립니다.
    fn read_bounded_line(&mut self) -> io::Result<usize> {
        let limit = u64::try_from(self.max_line_bytes)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)?;

        if self.line.len() > self.max_line_bytes && self.line.last() != Some(&b'\n') {
            self.line.truncate(self.max_line_bytes);
            drop_partial_char(&mut self.line);
            self.skip_to_line_end()?;
        }
        Ok(read)
    }

    fn skip_to_line_end(&mut self) -> io::Result<()> {
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    self.reader.consume(i + 1);
                    return Ok(());
                }
                None => {
                    let n = buf.len();
                    self.reader.consume(n);
                }
            }
        }
    }
}

/// 잘린 버퍼 끝의 미완성 UTF-8 문자를 제거합니다.
fn drop_partial_char(buf: &mut Vec<u8>) {
    for k in 1..=buf.len().min(3) {
        let start = buf.len() - k;
        if let Err(e) = std::str::from_utf8(&buf[start..]) {
            if e.valid_up_to() == 0 && e.error_len().is_none() {
                buf.truncate(start);
                return;
            }
        }
    }
}

impl<R: BufRead> Iterator for TextLineReader<R> {
    type Item = Result<Event, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(self.parser.parse_line(&line))),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for TextLineReader<R> {}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn parser() -> TextLineParser {
        TextLineParser::new().unwrap().with_year(2023)
    }

    #[test]
    fn parses_iso_timestamp_level_and_ip() {
        let event = parser().parse_line("2023-01-01T10:00:00Z ERROR Failed login from 192.168.1.10");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.message, "Failed login from 192.168.1.10");
        assert_eq!(event.metadata.get(WatchedKey::Ip), Some("192.168.1.10"));
        assert_eq!(event.source, TEXT_SOURCE);
        assert!(uuid::Uuid::parse_str(&event.id).is_ok());
    }

    #[test]
    fn parses_iso_timestamp_with_offset() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap();

        let event = parser().parse_line("2023-01-01T10:00:00+09:00 INFO x");
        assert_eq!(event.timestamp, expected);
        assert_eq!(event.message, "x");

        let event = parser().parse_line("2023-01-01T10:00:00+0900 INFO x");
        assert_eq!(event.timestamp, expected);
        assert_eq!(event.message, "x");

        let event = parser().parse_line("2022-12-31T20:00:00.5-05:00 ERROR late");
        assert_eq!(event.timestamp, expected + chrono::Duration::milliseconds(500));
        assert_eq!(event.message, "late");
    }

    #[test]
    fn parses_space_separated_timestamp_with_fraction() {
        let event = parser().parse_line("2023-01-01 10:00:00.250 WARN disk almost full");
        assert_eq!(event.timestamp.timestamp_subsec_millis(), 250);
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.message, "disk almost full");
    }

    #[test]
    fn parses_syslog_timestamp_with_padded_day() {
        let event = parser().parse_line("Jan  5 08:15:30 host sshd[42]: Accepted publickey");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2023, 1, 5, 8, 15, 30).unwrap()
        );
        assert_eq!(event.message, "host sshd[42]: Accepted publickey");
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let event = parser().parse_line("something happened");
        assert!(event.timestamp >= before);
        assert_eq!(event.level, Level::Info);
        assert_eq!(event.message, "something happened");
    }

    #[test]
    fn invalid_calendar_date_falls_back_to_now() {
        let before = Utc::now();
        let event = parser().parse_line("2023-13-45T10:00:00Z ERROR bad clock");
        assert!(event.timestamp >= before);
        assert_eq!(event.message, "bad clock");
    }

    #[test]
    fn bracketed_level_and_separators_are_stripped() {
        let event = parser().parse_line("2023-01-01T10:00:00Z [critical] - kernel panic");
        assert_eq!(event.level, Level::Critical);
        assert_eq!(event.message, "kernel panic");

        let event = parser().parse_line("2023-01-01T10:00:00Z | FATAL: out of memory");
        assert_eq!(event.level, Level::Fatal);
        assert_eq!(event.message, "out of memory");
    }

    #[test]
    fn warning_maps_to_warn() {
        let event = parser().parse_line("2023-01-01T10:00:00Z WARNING low battery");
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.message, "low battery");
    }

    #[test]
    fn level_must_be_whole_word() {
        let event = parser().parse_line("2023-01-01T10:00:00Z informational errors counted");
        assert_eq!(event.level, Level::Info);
        assert_eq!(event.message, "informational errors counted");
    }

    #[test]
    fn extracts_entity_tokens() {
        let event = parser().parse_line(
            "2023-01-01T10:00:00Z INFO login ok userId=alice, sessionId=s-9; deviceId=d1 userId=bob",
        );
        assert_eq!(event.metadata.get(WatchedKey::UserId), Some("alice"));
        assert_eq!(event.metadata.get(WatchedKey::SessionId), Some("s-9"));
        assert_eq!(event.metadata.get(WatchedKey::DeviceId), Some("d1"));
        assert_eq!(event.metadata.get(WatchedKey::Ip), None);
    }

    #[test]
    fn reader_skips_blank_lines_and_handles_crlf() {
        let input = b"2023-01-01T10:00:00Z INFO one\r\n\r\n   \n2023-01-01T10:00:01Z INFO two\r\n";
        let reader = TextLineReader::new(Cursor::new(input.to_vec()), "t.log", 1024, parser());
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "one");
        assert_eq!(events[1].message, "two");
    }

    #[test]
    fn reader_decodes_invalid_utf8_lossily() {
        let input = b"2023-01-01T10:00:00Z INFO bad \xff\xfe bytes\n";
        let reader = TextLineReader::new(Cursor::new(input.to_vec()), "t.log", 1024, parser());
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains('\u{FFFD}'));
    }

    #[test]
    fn reader_truncates_long_lines_on_char_boundary() {
        let mut line = "2023-01-01T10:00:00Z INFO ".to_owned();
        line.push_str(&"가".repeat(100));
        line.push('\n');
        let reader = TextLineReader::new(Cursor::new(line.into_bytes()), "t.log", 64, parser());
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.len() <= 64);
        assert!(events[0].message.starts_with('가'));
    }

    #[test]
    fn reader_bounds_memory_for_lines_without_newline() {
        let mut input = b"2023-01-01T10:00:00Z INFO ".to_vec();
        input.resize(input.len() + 8 * 1024 * 1024, b'x');
        let mut reader = TextLineReader::new(Cursor::new(input), "t.log", 64, parser());

        let event = reader.next().unwrap().unwrap();
        assert!(event.message.len() <= 64);
        assert!(reader.line.capacity() < 1024, "line buffer grew to {}", reader.line.capacity());
        assert!(reader.next().is_none());
    }

    #[test]
    fn reader_resumes_after_overlong_line() {
        let mut input = "x".repeat(10_000).into_bytes();
        input.extend_from_slice(b"\n2023-01-01T10:00:01Z WARN next line\n");
        let reader = TextLineReader::new(Cursor::new(input), "t.log", 64, parser());
        let events: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message.len(), 64);
        assert_eq!(events[1].level, Level::Warn);
        assert_eq!(events[1].message, "next line");
    }

    #[test]
    fn drop_partial_char_keeps_complete_chars() {
        let mut buf = "a가".as_bytes()[..3].to_vec();
        drop_partial_char(&mut buf);
        assert_eq!(buf, b"a");

        let mut buf = "a가".as_bytes().to_vec();
        drop_partial_char(&mut buf);
        assert_eq!(buf, "a가".as_bytes());
    }

    #[test]
    fn truncate_respects_multibyte_chars() {
        assert_eq!(truncate_on_char_boundary("가나다", 4), "가");
        assert_eq!(truncate_on_char_boundary("abc", 10), "abc");
    }

    #[test]
    fn cut_joins_with_single_space() {
        assert_eq!(cut("a  XX  b", 3..5), "a b");
        assert_eq!(cut("XX b", 0..2), "b");
        assert_eq!(cut("a XX", 2..4), "a");
    }
}
