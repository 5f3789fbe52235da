#![no_main]

use incident_timeline_engine::normalizer::text::TEXT_SOURCE;
use incident_timeline_engine::normalizer::{TextLineParser, TextLineReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = TextLineParser::new() else {
        return;
    };
    let reader = TextLineReader::new(data, "fuzz.log", 4096, parser.with_year(2023));

    // 텍스트 줄은 항상 이벤트가 되어야 한다 (메모리 입력이므로 I/O 에러 없음)
    for item in reader {
        let event = item.expect("in-memory text input never fails");
        assert_eq!(event.source, TEXT_SOURCE);
    }
});
