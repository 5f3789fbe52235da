#![no_main]

use incident_timeline_engine::normalizer::JsonArrayReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let reader = JsonArrayReader::new(data, "fuzz.json", 64 * 1024);

    // 크래시나 패닉 없이 이벤트 또는 에러를 내고, 첫 에러 뒤에는 멈춰야 한다
    let mut failed = false;
    for item in reader.take(10_000) {
        assert!(!failed, "reader yielded after an error");
        failed = item.is_err();
    }
});
