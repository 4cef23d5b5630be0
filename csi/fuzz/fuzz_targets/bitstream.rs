#![no_main]

use csi::bitstream::{decode, encode, Geometry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Geometry, usize, &[u8])| {
    let (geometry, start_offset, payload) = input;

    if let Ok(m) = decode(payload, geometry, start_offset % 64) {
        let b = encode(&m, geometry).unwrap();
        assert_eq!(decode(&b, geometry, 0).unwrap(), m);
    }
});
