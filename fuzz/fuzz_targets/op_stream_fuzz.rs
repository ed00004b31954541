#![no_main]
use libfuzzer_sys::fuzz_target;
use mangler::format::{OpIterator, Unmangler};

fuzz_target!(|data: &[u8]| {
    // Stepping the decoder and listing the stream must agree on every
    // executed opcode.
    let Ok(mut dec) = Unmangler::new(data, 1 << 16) else {
        return;
    };
    let Ok(listing) = OpIterator::new(data) else {
        return;
    };

    let mut listing = listing;
    while let Ok(Some(op)) = dec.next_op() {
        match listing.next() {
            Some(Ok((_, listed))) => assert_eq!(listed, op),
            other => panic!("listing diverged: {other:?}"),
        }
        assert!(dec.bytes_written() <= dec.declared_len());
    }
});
