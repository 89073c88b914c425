//! Fuzz target for flat map JSON parsing.
//!
//! Flat maps arrive from saved snapshots; rebuilding a tree from one must
//! reject bad input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pc_config::{patch_cnn, ConfigTree, FlatMap};

fuzz_target!(|data: &[u8]| {
    let Ok(flat) = serde_json::from_slice::<FlatMap>(data) else {
        return;
    };
    if let Ok(schema) = patch_cnn::default_tree() {
        let _ = ConfigTree::from_flat_map(&schema, &flat);
    }
});
