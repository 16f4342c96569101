#![no_main]
use libfuzzer_sys::fuzz_target;
use zq::input::parse_line;
use zq::output::{OutputConfig, OutputMode, format_compact, write_value};

// Parse a line, serialize it in every mode, and check that compact output
// parses back to the same text.
fuzz_target!(|data: &[u8]| {
    let Ok(Some(value)) = parse_line(data) else {
        return;
    };

    for mode in [OutputMode::Compact, OutputMode::Raw] {
        let mut out = Vec::new();
        let _ = write_value(&mut out, &value, &OutputConfig { mode });
    }

    let text = format_compact(&value);
    let reparsed = parse_line(text.as_bytes())
        .expect("compact output must parse")
        .expect("compact output is never blank");
    assert_eq!(format_compact(&reparsed), text);
});
