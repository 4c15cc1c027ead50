#![no_main]

use libfuzzer_sys::fuzz_target;
use resdec_arsc::{DecodeOptions, Decoder};

fuzz_target!(|data: &[u8]| {
    // must provide at least a chunk header and package count
    if data.len() < 12 {
        return;
    }

    let lenient = DecodeOptions {
        keep_broken: true,
        ..DecodeOptions::default()
    };
    let _ = Decoder::new(lenient).decode(data);
    let _ = Decoder::new(DecodeOptions::default()).decode(data);
});
