#![no_main]
use libfuzzer_sys::fuzz_target;
use zq::filter::{self, EvalError};
use zq::input::parse_line;
use zq::router::{Route, classify};
use zq::value::Value;

// Structured fuzzer: split input into JSON + filter, parse both, and evaluate
// natively when the router would. Catches panics in builtins, coercion,
// arithmetic and path deletion.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // First 2 bytes determine split point between JSON and filter.
    let split = u16::from_le_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    let split = split % rest.len();

    let json_part = &rest[..split];
    let filter_part = &rest[split..];

    let Ok(filter_str) = std::str::from_utf8(filter_part) else {
        return;
    };
    let Ok(filter) = filter::parse(filter_str) else {
        return;
    };
    if classify(&filter).route != Route::Native {
        return;
    }
    let Ok(Some(value)) = parse_line(json_part) else {
        return;
    };

    // Stop after 1000 outputs to bound execution.
    let mut count = 0;
    let result = filter::eval::eval(&filter, &value, &mut |_v: Value| {
        count += 1;
        if count >= 1000 {
            return Err(EvalError::runtime("output limit"));
        }
        Ok(())
    });
    // Routed-native expressions must never hit an unimplemented construct.
    assert!(!matches!(result, Err(EvalError::Unsupported(_))), "{filter_str}: {result:?}");
});
