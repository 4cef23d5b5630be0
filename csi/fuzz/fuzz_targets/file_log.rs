#![no_main]

use csi::frame::{FrameReader, Framing, Policy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for record in FrameReader::new(data, Framing::File)
        .with_trailing_margin(0)
        .records(Policy::Skip)
    {
        let _ = record;
    }

    let _ = FrameReader::new(data, Framing::Live).next_frame();
});
