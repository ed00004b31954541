#![no_main]
use libfuzzer_sys::fuzz_target;
use mangler::Options;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte selects greedy or lookahead encoding.
    let opts = Options {
        lookahead: data[0] & 1 == 0,
        ..Options::default()
    };
    let payload = &data[1..];

    let mangled = mangler::mangle_with_options(payload, &opts).unwrap();
    assert!(mangled.len() <= 4 + payload.len() + payload.len().div_ceil(63) + 1);

    let decoded = mangler::unmangle(&mangled).unwrap();
    assert_eq!(decoded, payload);
});
