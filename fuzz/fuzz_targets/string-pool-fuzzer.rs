#![no_main]

use libfuzzer_sys::fuzz_target;
use resdec_arsc::structs::string_pool::StringPool;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    if let Ok(pool) = StringPool::parse(&mut input, true) {
        for i in 0..pool.len() as u32 {
            let _ = pool.get(i);
            let _ = pool.spans(i);
        }
    }
});
