//! No-mock manifest loading, override, resolution and discovery tests.
//!
//! Covers:
//! - Loading real manifest fixtures (YAML and JSON) and rejecting bad ones
//! - The patch_cnn scenario: lookup, choice overrides, sentinel resolution
//! - Discovery order (explicit > env > config dir > XDG > built-in)
//! - Snapshots of discovered manifests

use pc_config::discover::{discover_manifest, load_discovered, load_file, ManifestSource};
use pc_config::overrides::apply_strs;
use pc_config::{
    load, patch_cnn, Combinator, ConfigError, ConfigSnapshot, ConfigTree, SentinelRules,
    SettingValue,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const ENV_KEYS: &[&str] = &["PATCH_CNN_SETTINGS", "PATCH_CNN_CONFIG_DIR", "XDG_CONFIG_HOME"];

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("test")
        .join("fixtures")
        .join("settings")
}

fn load_fixture(name: &str) -> Result<ConfigTree, ConfigError> {
    load_file(&fixtures_dir().join(name)).map(|(tree, _)| tree)
}

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write_fixture(src_name: &str, dest: &Path) {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).expect("create fixture parent");
    }
    fs::copy(fixtures_dir().join(src_name), dest).expect("copy fixture");
}

#[test]
fn test_load_yaml_fixture() {
    let tree = load_fixture("valid_manifest.yaml").expect("valid manifest should load");
    assert_eq!(tree.get_i64("Feature.BinsPerOctave").unwrap(), 48);
    assert_eq!(tree.get_i64("Feature.Spectral.WindowSize").unwrap(), 2049);
    assert!(tree.get_bool("Feature.Spectral.Normalize").unwrap());
    assert_eq!(
        tree.node("Feature.Spectral").unwrap().description(),
        Some("Nested group in bare form")
    );
    assert_eq!(
        tree.get("Feature.Gamma").unwrap(),
        &SettingValue::List(vec![
            SettingValue::Float(0.24),
            SettingValue::Float(0.6),
            SettingValue::Float(1.0),
        ])
    );
}

#[test]
fn test_load_json_fixture() {
    let tree = load_fixture("valid_manifest.json").expect("json manifest should load");
    assert_eq!(tree.get_str("Model.SavePrefix").unwrap(), "patch_cnn");
    assert_eq!(tree.get_f64("Training.InitLearningRate").unwrap(), 0.00001);
    let paths: Vec<String> = tree.sentinel_paths().iter().map(ToString::to_string).collect();
    assert_eq!(paths, ["Model.SavePath"]);
}

#[test]
fn test_invalid_fixtures_fail_with_schema_errors() {
    for name in [
        "invalid_unknown_type.yaml",
        "invalid_missing_subtype.yaml",
        "invalid_bad_choice.yaml",
        "invalid_fractional_integer.yaml",
    ] {
        let err = load_fixture(name).expect_err("invalid fixture should fail");
        assert!(matches!(err, ConfigError::Schema { .. }), "{name}: {err}");
        assert_eq!(err.code(), 72);
    }
}

#[test]
fn test_patch_cnn_scenario() {
    let tree = patch_cnn::default_tree().expect("builtin manifest");
    assert_eq!(
        tree.get("Feature.BinsPerOctave").unwrap(),
        &SettingValue::Integer(48)
    );

    let prior = tree
        .with_override("Inference.MaxMethod", "prior")
        .expect("prior is a valid choice");
    assert_eq!(prior.get_str("Inference.MaxMethod").unwrap(), "prior");

    let err = tree
        .with_override("Inference.MaxMethod", "random")
        .expect_err("random is not a choice");
    assert!(matches!(err, ConfigError::TypeMismatch { .. }));

    assert!(tree.get("Dataset.FeatureSavePath").unwrap().is_sentinel());
    let rules = SentinelRules::new().derive(
        "Dataset.FeatureSavePath",
        "Dataset.SavePath",
        Combinator::Join("feature".to_string()),
    );
    let resolved = tree.resolve(&rules).expect("resolve");
    let save_path = resolved.get_str("Dataset.SavePath").unwrap();
    let feature_path = resolved.get_str("Dataset.FeatureSavePath").unwrap();
    assert!(Path::new(feature_path).starts_with(save_path));
    assert_ne!(feature_path, "+");
}

#[test]
fn test_resolve_after_override_uses_new_source() {
    let tree = patch_cnn::default_tree().unwrap();
    let tree = apply_strs(&tree, &["Dataset.SavePath=/data/mir1k"]).unwrap();
    let resolved = tree.resolve(&patch_cnn::default_rules()).unwrap();
    assert_eq!(
        resolved.get_str("Dataset.FeatureSavePath").unwrap(),
        "/data/mir1k/feature"
    );
}

#[test]
fn test_explicit_feature_path_skips_derivation() {
    let tree = patch_cnn::default_tree().unwrap();
    let tree = apply_strs(&tree, &["Dataset.FeatureSavePath=/scratch/feature"]).unwrap();
    let resolved = tree.resolve(&SentinelRules::new()).unwrap();
    assert_eq!(
        resolved.get_str("Dataset.FeatureSavePath").unwrap(),
        "/scratch/feature"
    );
}

#[test]
fn test_unresolved_sentinel_without_rule() {
    let tree = patch_cnn::default_tree().unwrap();
    let err = tree.resolve(&SentinelRules::new()).unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedSentinel { .. }));
}

#[test]
fn test_discover_explicit_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        let explicit = temp.path().join("cli").join("patch_cnn.yaml");
        let from_env = temp.path().join("env").join("patch_cnn.yaml");
        write_fixture("valid_manifest.yaml", &explicit);
        write_fixture("valid_manifest.yaml", &from_env);

        env::set_var("PATCH_CNN_SETTINGS", from_env.display().to_string());

        let location = discover_manifest(Some(&explicit));
        assert_eq!(location.source, ManifestSource::Explicit);
        assert_eq!(location.path.unwrap(), explicit);
    });
}

#[test]
fn test_discover_env_over_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        let from_env = temp.path().join("env").join("settings.yaml");
        let config_dir = temp.path().join("config_dir");
        write_fixture("valid_manifest.yaml", &from_env);
        write_fixture("valid_manifest.yaml", &config_dir.join("patch_cnn.yaml"));

        env::set_var("PATCH_CNN_SETTINGS", from_env.display().to_string());
        env::set_var("PATCH_CNN_CONFIG_DIR", config_dir.display().to_string());

        let location = discover_manifest(None);
        assert_eq!(location.source, ManifestSource::Environment);
        assert_eq!(location.path.unwrap(), from_env);
    });
}

#[test]
fn test_discover_missing_explicit_falls_through() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        let config_dir = temp.path().join("config_dir");
        write_fixture("valid_manifest.yaml", &config_dir.join("patch_cnn.yaml"));
        env::set_var("PATCH_CNN_CONFIG_DIR", config_dir.display().to_string());

        let missing = temp.path().join("nope.yaml");
        let location = discover_manifest(Some(&missing));
        assert_eq!(location.source, ManifestSource::Environment);
        assert_eq!(location.path.unwrap(), config_dir.join("patch_cnn.yaml"));
    });
}

#[test]
fn test_discover_xdg_fallback() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        let xdg_dir = temp.path().join("xdg");
        let app_dir = xdg_dir.join("patch-cnn");
        write_fixture("valid_manifest.yaml", &app_dir.join("patch_cnn.yaml"));

        env::set_var("XDG_CONFIG_HOME", xdg_dir.display().to_string());

        let location = discover_manifest(None);
        assert_eq!(location.source, ManifestSource::XdgConfig);
        assert_eq!(location.path.unwrap(), app_dir.join("patch_cnn.yaml"));
    });
}

#[test]
fn test_load_discovered_builtin_snapshot() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        env::set_var("XDG_CONFIG_HOME", temp.path().display().to_string());

        let loaded = load_discovered(None).expect("builtin manifest");
        if loaded.location.source != ManifestSource::Builtin {
            // A system-wide /etc/patch-cnn manifest takes precedence on this host.
            return;
        }
        assert_eq!(loaded.raw, patch_cnn::manifest());

        let resolved = loaded.tree.resolve(&patch_cnn::default_rules()).unwrap();
        let snapshot = ConfigSnapshot::from_loaded(&loaded, &resolved);
        assert_eq!(snapshot.manifest_source, "builtin manifest");
        assert!(snapshot.manifest_hash.is_some());
        assert!(snapshot.is_resolved());
        assert_eq!(
            snapshot.values.get("Dataset.FeatureSavePath"),
            Some(&SettingValue::from("./feature"))
        );
    });
}

#[test]
fn test_load_discovered_reports_bad_file() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);

        let temp = TempDir::new().expect("temp dir");
        let bad = temp.path().join("patch_cnn.yaml");
        write_fixture("invalid_unknown_type.yaml", &bad);

        let err = load_discovered(Some(&bad)).expect_err("bad manifest must fail");
        assert!(matches!(err, ConfigError::Schema { .. }));
    });
}

#[test]
fn test_loaded_manifest_round_trips_through_text() {
    let tree = load_fixture("valid_manifest.yaml").unwrap();
    let text = pc_config::manifest::to_manifest_string(&tree).unwrap();
    assert_eq!(load(&text).unwrap(), tree);
}
