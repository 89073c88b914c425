//! Fuzz target for override sequences against the built-in manifest.
//!
//! A rejected override must leave the tree unchanged, and resolution must
//! never panic whatever the overrides left behind.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pc_config::{patch_cnn, SettingValue};

#[derive(Debug, Arbitrary)]
enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Str(s) => SettingValue::String(s),
            Value::Int(n) => SettingValue::Integer(n),
            Value::Float(x) => SettingValue::Float(x),
            Value::Bool(b) => SettingValue::Boolean(b),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Override {
    leaf: u8,
    value: Value,
}

fuzz_target!(|ops: Vec<Override>| {
    let Ok(mut tree) = patch_cnn::default_tree() else {
        return;
    };
    let paths: Vec<String> = tree.leaves().iter().map(|(p, _)| p.to_string()).collect();
    let rules = patch_cnn::default_rules();

    for op in ops {
        let path = &paths[op.leaf as usize % paths.len()];
        let before = tree.to_flat_map();
        match tree.with_override(path, SettingValue::from(op.value)) {
            Ok(next) => tree = next,
            Err(_) => assert_eq!(tree.to_flat_map(), before),
        }
        let _ = tree.resolve(&rules);
    }
});
