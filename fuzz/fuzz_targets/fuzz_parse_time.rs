#![no_main]

use libfuzzer_sys::fuzz_target;
use localvolts::time::{format_time, parse_time};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(dt) = parse_time(s)
    {
        assert!(format_time(&dt).ends_with('Z'));
    }
});
