#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary UTF-8 through the lexer, parser and router.
// Catches panics and stack overflows on deeply nested expressions, and
// checks that routing never fails for a parsed expression.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(filter) = zq::filter::parse(s) {
            let _ = zq::router::classify(&filter);
        }
    }
});
