#![no_main]

use calltrace::codec::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed traces must surface as errors, never panics
    let Ok(parser) = Parser::new(data) else {
        return;
    };
    for call in parser {
        match call {
            Ok(call) => {
                let _ = call.dump(false);
            }
            Err(_) => break,
        }
    }
});
