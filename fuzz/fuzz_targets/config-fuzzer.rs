#![no_main]

use libfuzzer_sys::fuzz_target;
use resdec_arsc::ResConfig;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    if let Ok(config) = ResConfig::parse(&mut input) {
        // the canonical form must always parse back
        let qualifiers = config.qualifiers();
        let _ = qualifiers.parse::<ResConfig>();
        let _ = config.directory_name();
    }
});
