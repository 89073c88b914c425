//! Fuzz target for `Path=value` override parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pc_config::{apply_assignments, patch_cnn, Assignment};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(assignment) = Assignment::parse(text) else {
        return;
    };
    if let Ok(tree) = patch_cnn::default_tree() {
        let _ = apply_assignments(&tree, [&assignment]);
    }
});
