//! Fuzz target for dataset JSON parsing.
//!
//! Arbitrary bytes go through deserialization and the schema checks run
//! when elements enter the container.

#![no_main]

use libfuzzer_sys::fuzz_target;
use spatialdata::dataset::io_json::from_json_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_json_slice(data);
});
