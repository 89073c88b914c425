//! Configuration snapshots for session telemetry and reproducibility.
//!
//! A snapshot captures the exact settings a run started with, so that a
//! transcription or training run can be audited and reproduced later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::discover::{LoadedManifest, ManifestSource};
use crate::tree::{ConfigTree, FlatMap};
use crate::value::SettingValue;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the manifest format.
    pub schema_version: String,

    /// Source of the manifest.
    pub manifest_source: String,

    /// Path where the manifest was loaded from.
    #[serde(default)]
    pub manifest_path: Option<String>,

    /// SHA-256 hash of the raw manifest text.
    #[serde(default)]
    pub manifest_hash: Option<String>,

    /// SHA-256 hash of the flattened values (for quick comparison).
    pub values_hash: String,

    /// Settings still holding the sentinel when the snapshot was taken.
    #[serde(default)]
    pub unresolved: Vec<String>,

    /// Every setting, in declaration order.
    pub values: FlatMap,
}

impl ConfigSnapshot {
    /// Create a snapshot of `tree`.
    pub fn new(
        tree: &ConfigTree,
        source: &ManifestSource,
        manifest_path: Option<&std::path::Path>,
        manifest_raw: Option<&str>,
    ) -> Self {
        let values = tree.to_flat_map();
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: crate::MANIFEST_SCHEMA_VERSION.to_string(),
            manifest_source: source.to_string(),
            manifest_path: manifest_path.map(|p| p.display().to_string()),
            manifest_hash: manifest_raw.map(hash_content),
            values_hash: hash_values(&values),
            unresolved: tree
                .sentinel_paths()
                .iter()
                .map(ToString::to_string)
                .collect(),
            values,
        }
    }

    /// Snapshot of a (possibly overridden and resolved) tree that came from `loaded`.
    pub fn from_loaded(loaded: &LoadedManifest, tree: &ConfigTree) -> Self {
        ConfigSnapshot::new(
            tree,
            &loaded.location.source,
            loaded.location.path.as_deref(),
            Some(&loaded.raw),
        )
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot holds the same values as another.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.values_hash == other.values_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.values_hash[..12.min(self.values_hash.len())]
    }

    /// Whether every sentinel was resolved before the snapshot.
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// SHA-256 over a canonical encoding of every path and value.
///
/// Each value is tagged with its type and strings are length-prefixed, so
/// `1`, `1.0` and `"1"` hash differently and no two maps share an encoding.
fn hash_values(values: &FlatMap) -> String {
    let mut hasher = Sha256::new();
    hasher.update((values.len() as u64).to_le_bytes());
    for (path, value) in values.iter() {
        hash_str(&mut hasher, path);
        hash_value(&mut hasher, value);
    }
    hex::encode(hasher.finalize())
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value(hasher: &mut Sha256, value: &SettingValue) {
    match value {
        SettingValue::String(s) => {
            hasher.update([b's']);
            hash_str(hasher, s);
        }
        SettingValue::Integer(i) => {
            hasher.update([b'i']);
            hasher.update(i.to_le_bytes());
        }
        SettingValue::Float(f) => {
            hasher.update([b'f']);
            hasher.update(f.to_bits().to_le_bytes());
        }
        SettingValue::Boolean(b) => hasher.update([b'b', u8::from(*b)]),
        SettingValue::List(items) => {
            hasher.update([b'l']);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        SettingValue::Map(entries) => {
            hasher.update([b'm']);
            hasher.update((entries.len() as u64).to_le_bytes());
            for (key, item) in entries {
                hash_value(hasher, key);
                hash_value(hasher, item);
            }
        }
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
