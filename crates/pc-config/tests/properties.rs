//! Property-based tests for setting validation, overrides and resolution.

use proptest::prelude::*;
use serde_yaml::{Mapping, Value};
use pc_config::{
    load, patch_cnn, Assignment, Combinator, ConfigError, ConfigTree, FlatMap, SentinelRules,
    SettingValue,
};

fn builtin() -> ConfigTree {
    patch_cnn::default_tree().expect("builtin manifest")
}

/// Path-ish strings that never collide with the sentinel.
fn save_path() -> impl Strategy<Value = String> {
    "(/|\\./)?[a-z0-9_]{1,8}(/[a-z0-9_]{1,8}){0,3}"
}

// ============================================================================
// Integer and Float admission
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any i64 is admitted unchanged by an Integer setting.
    #[test]
    fn integer_override_accepts_any_i64(n in any::<i64>()) {
        let tree = builtin().with_override("Feature.BinsPerOctave", n).unwrap();
        prop_assert_eq!(tree.get_i64("Feature.BinsPerOctave").unwrap(), n);
    }

    /// Whole floats narrow to integers, fractional ones are rejected.
    #[test]
    fn integer_override_rejects_fractions(whole in -1_000_000i64..1_000_000, frac in 0.01f64..0.99) {
        let tree = builtin();

        let narrowed = tree.with_override("Training.Epoch", whole as f64).unwrap();
        prop_assert_eq!(narrowed.get("Training.Epoch").unwrap(), &SettingValue::Integer(whole));

        let err = tree.with_override("Training.Epoch", whole as f64 + frac).unwrap_err();
        prop_assert!(matches!(err, ConfigError::TypeMismatch { .. }), "{}", err);
    }

    /// NaN and the infinities never enter a Float setting.
    #[test]
    fn float_override_rejects_non_finite(
        f in prop_oneof![any::<f64>(), Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
    ) {
        let tree = builtin();
        let result = tree.with_override("Inference.Threshold", f);
        if f.is_finite() {
            prop_assert_eq!(result.unwrap().get_f64("Inference.Threshold").unwrap(), f);
        } else {
            prop_assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })), "expected TypeMismatch, got {:?}", result);
        }
    }

    /// Integers widen on Float settings.
    #[test]
    fn float_override_widens_integers(n in -1_000_000i64..1_000_000) {
        let tree = builtin().with_override("Inference.Threshold", n).unwrap();
        prop_assert_eq!(tree.get("Inference.Threshold").unwrap(), &SettingValue::Float(n as f64));
    }
}

// ============================================================================
// Choices
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Only the declared choices are admitted, compared exactly.
    #[test]
    fn max_method_only_accepts_choices(candidate in "[A-Za-z]{1,10}") {
        let tree = builtin();
        let result = tree.with_override("Inference.MaxMethod", candidate.as_str());
        if candidate == "posterior" || candidate == "prior" {
            let tree = result.unwrap();
            prop_assert_eq!(tree.get_str("Inference.MaxMethod").unwrap(), candidate.as_str());
        } else {
            prop_assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })), "expected TypeMismatch, got {:?}", result);
        }
    }

    /// A rejected override leaves the original tree untouched.
    #[test]
    fn failed_override_does_not_mutate(candidate in "[a-z]{1,10}") {
        let tree = builtin();
        let before = tree.to_flat_map();
        let _ = tree.with_override("Inference.MaxMethod", candidate.as_str());
        let _ = tree.with_override("Feature.PatchSize", candidate.as_str());
        prop_assert_eq!(tree.to_flat_map(), before);
    }
}

// ============================================================================
// Sentinel resolution
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The derived feature path lives under the dataset path.
    #[test]
    fn feature_path_derives_from_save_path(base in save_path()) {
        let tree = builtin().with_override("Dataset.SavePath", base.as_str()).unwrap();
        let resolved = tree.resolve(&patch_cnn::default_rules()).unwrap();
        let feature = resolved.get_str("Dataset.FeatureSavePath").unwrap();
        prop_assert!(std::path::Path::new(feature).starts_with(&base));
        prop_assert!(std::path::Path::new(feature).ends_with(patch_cnn::FEATURE_SUBDIR));
        prop_assert!(resolved.is_resolved());
    }

    /// Resolving twice changes nothing.
    #[test]
    fn resolve_is_idempotent(base in save_path()) {
        let tree = builtin().with_override("Dataset.SavePath", base.as_str()).unwrap();
        let rules = patch_cnn::default_rules();
        let once = tree.resolve(&rules).unwrap();
        let twice = once.resolve(&rules).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Copy chains resolve in any depth.
    #[test]
    fn copy_chain_resolves(base in save_path(), depth in 1usize..6) {
        let mut manifest = String::from("Paths:\n");
        manifest.push_str(&format!("  P0:\n    Type: String\n    Value: \"{base}\"\n"));
        let mut rules = SentinelRules::new();
        for i in 1..=depth {
            manifest.push_str(&format!("  P{i}:\n    Type: String\n    Value: \"+\"\n"));
            rules = rules.derive(&format!("Paths.P{i}"), &format!("Paths.P{}", i - 1), Combinator::Copy);
        }
        let tree = load(&manifest).unwrap();
        prop_assert_eq!(tree.sentinel_paths().len(), depth);

        let resolved = tree.resolve(&rules).unwrap();
        for i in 0..=depth {
            let path = format!("Paths.P{i}");
            prop_assert_eq!(resolved.get_str(&path).unwrap(), base.as_str());
        }
    }
}

// ============================================================================
// Flat maps and assignments
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Rebuilding from a flat map reproduces the overridden tree.
    #[test]
    fn flat_map_rebuilds_tree(patch in 1i64..512, threshold in 0.0f64..1.0, base in save_path()) {
        let tree = builtin()
            .with_override("Feature.PatchSize", patch).unwrap()
            .with_override("Inference.Threshold", threshold).unwrap()
            .with_override("Dataset.SavePath", base.as_str()).unwrap();

        let flat: FlatMap = tree.to_flat_map();
        let rebuilt = ConfigTree::from_flat_map(&builtin(), &flat).unwrap();
        prop_assert_eq!(rebuilt, tree);
    }

    /// Flat map paths are exactly the leaf paths, in declaration order.
    #[test]
    fn flat_map_paths_match_leaves(patch in 1i64..512) {
        let tree = builtin().with_override("Feature.PatchSize", patch).unwrap();
        let flat = tree.to_flat_map();
        let leaf_paths: Vec<String> = tree.leaves().iter().map(|(p, _)| p.to_string()).collect();
        let flat_paths: Vec<&str> = flat.paths().collect();
        prop_assert_eq!(flat_paths, leaf_paths.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// `Path=value` assignments for integers parse to the same value as a direct override.
    #[test]
    fn assignment_matches_direct_override(n in 0i64..100_000) {
        let assignment: Assignment = format!("Training.Steps={n}").parse().unwrap();
        let tree = builtin();
        let via_text = pc_config::apply_assignments(&tree, [&assignment]).unwrap();
        let direct = tree.with_override("Training.Steps", n).unwrap();
        prop_assert_eq!(via_text, direct);
    }
}

// ============================================================================
// Generated manifests
// ============================================================================

/// Setting names: printable, dot-free, no surrounding whitespace.
fn setting_name() -> impl Strategy<Value = String> {
    "[!-\\-/-~\\p{L}]([ !-\\-/-~\\p{L}]{0,8}[!-\\-/-~\\p{L}])?"
}

fn description() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[ -~]{0,20}")
}

fn scalar_kind() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["String", "Integer", "Float", "Boolean"])
}

fn scalar_value(kind: &'static str) -> BoxedStrategy<Value> {
    match kind {
        "String" => "[ -~]{0,12}".prop_map(Value::from).boxed(),
        "Integer" => any::<i64>().prop_map(Value::from).boxed(),
        "Float" => any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from)
            .boxed(),
        _ => any::<bool>().prop_map(Value::from).boxed(),
    }
}

fn leaf(
    kind: &str,
    sub_type: Option<Value>,
    value: Value,
    description: Option<String>,
    choices: Option<Vec<Value>>,
) -> Value {
    let mut mapping = Mapping::new();
    if let Some(description) = description {
        mapping.insert("Description".into(), description.into());
    }
    mapping.insert("Type".into(), kind.into());
    if let Some(sub_type) = sub_type {
        mapping.insert("SubType".into(), sub_type);
    }
    mapping.insert("Value".into(), value);
    if let Some(choices) = choices {
        mapping.insert("Choices".into(), Value::Sequence(choices));
    }
    Value::Mapping(mapping)
}

fn leaf_manifest() -> impl Strategy<Value = Value> {
    prop_oneof![
        (scalar_kind(), description()).prop_flat_map(|(kind, description)| {
            scalar_value(kind).prop_map(move |value| leaf(kind, None, value, description.clone(), None))
        }),
        (prop::collection::btree_set(any::<i64>(), 1..5), any::<prop::sample::Index>()).prop_map(
            |(choices, pick)| {
                let choices: Vec<i64> = choices.into_iter().collect();
                let value = choices[pick.index(choices.len())];
                let choices = choices.into_iter().map(Value::from).collect();
                leaf("Integer", None, Value::from(value), None, Some(choices))
            }
        ),
        scalar_kind().prop_flat_map(|kind| {
            prop::collection::vec(scalar_value(kind), 0..4).prop_map(move |items| {
                leaf("List", Some(kind.into()), Value::Sequence(items), None, None)
            })
        }),
        (prop::sample::select(vec!["String", "Integer"]), scalar_kind()).prop_flat_map(
            |(key_kind, value_kind)| {
                prop::collection::vec((scalar_value(key_kind), scalar_value(value_kind)), 0..4)
                    .prop_map(move |entries| {
                        // Repeated keys collapse here; the manifest never repeats one.
                        let entries: Mapping = entries.into_iter().collect();
                        let sub_type = Value::Sequence(vec![key_kind.into(), value_kind.into()]);
                        leaf("Map", Some(sub_type), Value::Mapping(entries), None, None)
                    })
            }
        ),
    ]
}

fn node_manifest() -> impl Strategy<Value = Value> {
    leaf_manifest().prop_recursive(3, 32, 4, |inner| {
        (prop::collection::vec((setting_name(), inner), 1..4), description()).prop_map(
            |(children, description)| {
                let mut mapping = Mapping::new();
                if let Some(description) = description {
                    mapping.insert("Description".into(), description.into());
                }
                let children: Mapping = children
                    .into_iter()
                    .map(|(name, node)| (Value::from(name), node))
                    .collect();
                mapping.insert("Settings".into(), Value::Mapping(children));
                Value::Mapping(mapping)
            },
        )
    })
}

/// A manifest document whose top-level sections use the bare form.
fn manifest_doc() -> impl Strategy<Value = Value> {
    let section = setting_name().prop_filter("reserved at the top level", |name| {
        name != "Description" && name != "Settings"
    });
    prop::collection::vec((section, node_manifest()), 1..5).prop_map(|sections| {
        Value::Mapping(
            sections
                .into_iter()
                .map(|(name, node)| (Value::from(name), node))
                .collect(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Flattening a loaded manifest and rebuilding from it is lossless.
    #[test]
    fn generated_manifest_flat_map_round_trip(doc in manifest_doc()) {
        let text = serde_yaml::to_string(&doc).unwrap();
        let tree = load(&text).unwrap();

        let flat = tree.to_flat_map();
        let rebuilt = ConfigTree::from_flat_map(&tree, &flat).unwrap();
        prop_assert_eq!(&rebuilt.to_flat_map(), &flat);
        prop_assert_eq!(&rebuilt, &tree);
        for (path, value) in flat.iter() {
            prop_assert_eq!(tree.get(path).unwrap(), value);
        }
    }

    /// Writing a loaded manifest back out and reloading it gives an equal tree.
    #[test]
    fn generated_manifest_write_back_round_trip(doc in manifest_doc()) {
        let text = serde_yaml::to_string(&doc).unwrap();
        let tree = load(&text).unwrap();

        let written = pc_config::manifest::to_manifest_string(&tree).unwrap();
        prop_assert_eq!(load(&written).unwrap(), tree);
    }
}
