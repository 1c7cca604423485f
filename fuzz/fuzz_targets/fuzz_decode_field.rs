#![no_main]

use libfuzzer_sys::fuzz_target;
use sml_bridge::sml::{decode_field, scan_fields};

fuzz_target!(|data: &[u8]| {
    // Offsets past the end must yield None rather than panic
    for offset in 0..=data.len() + 1 {
        if decode_field(data, offset).is_some() {
            assert!(offset + 2 <= data.len());
        }
    }

    let record = scan_fields(data, 0..data.len());
    assert_eq!(record.offsets.len(), record.values.len());
});
