#![no_main]

use csi::header::CsiHeader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|header: CsiHeader| {
    let b = header.to_bytes();
    assert_eq!(CsiHeader::from_slice(&b), Ok(header));
});
