//! Fuzz target for settings manifest loading.
//!
//! Tests that manifest parsing and validation handle arbitrary text without
//! panicking, including when an accepted manifest is written back out.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pc_config::manifest;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(tree) = manifest::load(text) else {
        return;
    };
    let _ = tree.to_flat_map();
    if let Ok(written) = manifest::to_manifest_string(&tree) {
        let _ = manifest::load(&written);
    }
});
