#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zq::filter::parse;
use zq::ndjson::{process_slurp, process_stream};
use zq::output::{OutputConfig, OutputMode};

// Arbitrary bytes as an NDJSON stream through both drivers.
// Catches panics in line splitting, window growth and BOM handling.
fuzz_target!(|data: &[u8]| {
    let Ok(filter) = parse(".a // .") else {
        return;
    };
    for mode in [OutputMode::Compact, OutputMode::Raw] {
        let config = OutputConfig { mode };
        let mut out = Vec::new();
        let stats = process_stream(&mut Cursor::new(data), &filter, &config, &mut out)
            .expect("in-memory stream cannot fail");
        assert!(stats.outputs <= stats.records);

        let mut out = Vec::new();
        let _ = process_slurp(&mut Cursor::new(data), &filter, &config, &mut out);
    }
});
