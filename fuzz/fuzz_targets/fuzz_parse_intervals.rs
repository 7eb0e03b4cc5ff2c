#![no_main]

use libfuzzer_sys::fuzz_target;
use localvolts::client::parse_intervals;
use localvolts::quality::{select_final, sum_cost};

fuzz_target!(|data: &[u8]| {
    if let Ok(readings) = parse_intervals(data) {
        assert!(!readings.is_empty());
        let _ = select_final(&readings);
        let _ = sum_cost(&readings);
    }
});
