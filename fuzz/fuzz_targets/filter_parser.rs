#![no_main]

use calltrace::filter::CallFilter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Any expression either parses or is rejected, without panicking
        if let Ok(filter) = CallFilter::from_expr(input) {
            let _ = filter.should_show("glClear");
        }
    }
});
