#![no_main]
use libfuzzer_sys::fuzz_target;
use mangler::format::decoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary streams must only ever produce errors, never panics.
    // The small ceiling keeps huge declared lengths from allocating.
    if let Ok(out) = decoder::unmangle(data, 1 << 16) {
        let declared = decoder::read_header(data).unwrap();
        assert_eq!(out.len(), declared);
    }
});
